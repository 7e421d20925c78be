//! Caller-side description of a REST call.

use crate::http::HttpMethod;
use crate::params::Params;

/// A REST call before query encoding and signing.
///
/// Header names are unique ignoring ASCII case; setting one again replaces
/// the earlier value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: HttpMethod,
    pub resource: String,
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
    pub params: Option<Params>,
}

impl Request {
    pub fn new(method: HttpMethod, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            body: None,
            headers: Vec::new(),
            params: None,
        }
    }

    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, resource)
    }

    pub fn post(resource: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, resource)
    }

    pub fn put(resource: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, resource)
    }

    pub fn delete(resource: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, resource)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Attach query parameters. The map is copied; the caller's stays as is.
    pub fn params(mut self, params: &Params) -> Self {
        self.params = Some(params.clone());
        self
    }
}

/// Insert or replace `name`, matching existing names case-insensitively.
pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some(entry) => *entry = (name, value),
        None => headers.push((name, value)),
    }
}
