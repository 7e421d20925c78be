//! Signed request dispatcher for the attestation API.
//!
//! # Design
//! `AttestationClient` owns the `ConnectionConfig` and an injected signer.
//! Each call is split like the rest of the crate's I/O boundary:
//! `prepare` turns a `Request` into a signed `HttpRequest` without touching
//! the network, and `execute` opens a fresh connection, writes
//! `HttpRequest::to_wire`, reads the whole response and classifies it.
//! The bytes that were signed are the bytes that are sent.
//!
//! There is no pooling and no retry. A call either returns the response or
//! exactly one `ApiError`.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::{debug, debug_span, warn, Dispatch};

use crate::config::{ConnectionConfig, Credentials};
use crate::error::{ApiError, ConnectionError};
use crate::http::{self, HttpMethod, HttpRequest, HttpResponse};
use crate::params::{resource_with_query, Params};
use crate::request::{set_header, Request};
use crate::signer::{RequestSigner, SigningRequest};
use crate::status;
use crate::transport;

/// Headers the dispatcher always sets itself.
const RESERVED_HEADERS: [&str; 5] = ["host", "content-length", "transfer-encoding", "connection", "authorization"];

/// Blocking client for the attestation service; one connection per call.
///
/// `execute` takes `&self`, so a client may be shared across threads.
/// `set_credentials` takes `&mut self`; callers that share a client and also
/// rotate credentials must serialize the two themselves, e.g. behind a
/// `RwLock`.
pub struct AttestationClient {
    config: ConnectionConfig,
    signer: Arc<dyn RequestSigner>,
    dispatch: Option<Dispatch>,
}

impl fmt::Debug for AttestationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationClient")
            .field("config", &self.config)
            .field("signer", &"<RequestSigner>")
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}

impl AttestationClient {
    pub fn new(config: ConnectionConfig, signer: impl RequestSigner + 'static) -> Self {
        Self::with_shared_signer(config, Arc::new(signer))
    }

    pub fn with_shared_signer(config: ConnectionConfig, signer: Arc<dyn RequestSigner>) -> Self {
        Self {
            config,
            signer,
            dispatch: None,
        }
    }

    /// Route this client's log events to `dispatch` instead of the global
    /// subscriber. The dispatch is installed only for the duration of a call.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Replace the credential pair used from the next call on.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        debug!(user = %credentials.user, "credentials replaced");
        self.config.credentials = credentials;
    }

    /// Build the signed request for `request` without any I/O.
    ///
    /// The resource and every header are checked before the signer runs, so
    /// a request that cannot be written verbatim is never signed or sent.
    pub fn prepare(&self, request: &Request) -> Result<HttpRequest, ApiError> {
        let target = resource_with_query(&request.resource, request.params.as_ref());
        http::check_target(&target)?;
        let body = request.body.clone().filter(|body| !body.is_empty());

        let mut headers = vec![
            ("Host".to_string(), self.config.authority()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        http::check_header("Host", &headers[0].1)?;
        for (name, value) in &request.headers {
            http::check_header(name, value)?;
            if RESERVED_HEADERS.iter().any(|reserved| name.eq_ignore_ascii_case(reserved)) {
                warn!(header = %name, "ignoring caller header managed by the client");
                continue;
            }
            set_header(&mut headers, name.clone(), value.clone());
        }

        let authorization = self.signer.sign(&SigningRequest {
            method: &request.method,
            resource: &target,
            body: body.as_deref(),
            credentials: &self.config.credentials,
        });
        http::check_header("Authorization", &authorization)?;
        headers.push(("Authorization".to_string(), authorization));
        headers.push(("Connection".to_string(), "close".to_string()));

        Ok(HttpRequest {
            method: request.method.clone(),
            target,
            headers,
            body,
        })
    }

    /// Send `request` over a new connection and classify the response.
    pub fn execute(&self, request: &Request) -> Result<HttpResponse, ApiError> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.round_trip(request)),
            None => self.round_trip(request),
        }
    }

    pub fn get(&self, resource: &str, params: Option<&Params>) -> Result<HttpResponse, ApiError> {
        let mut request = Request::get(resource);
        request.params = params.cloned();
        self.execute(&request)
    }

    pub fn post(&self, resource: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse, ApiError> {
        self.execute(&Request::post(resource).body(body))
    }

    pub fn put(&self, resource: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse, ApiError> {
        self.execute(&Request::put(resource).body(body))
    }

    pub fn delete(&self, resource: &str) -> Result<HttpResponse, ApiError> {
        self.execute(&Request::delete(resource))
    }

    fn round_trip(&self, request: &Request) -> Result<HttpResponse, ApiError> {
        let span = debug_span!("execute", method = request.method.as_str(), resource = %request.resource);
        let _guard = span.enter();

        let prepared = self.prepare(request)?;
        let mut conn = transport::open(&self.config, self.config.connect_timeout())?;
        debug!(
            path = %prepared.target,
            body_len = prepared.body.as_ref().map_or(0, Vec::len),
            "sending request"
        );

        conn.write_all(&prepared.to_wire()).map_err(ConnectionError::Io)?;
        conn.flush().map_err(ConnectionError::Io)?;
        let response = http::read_response(&mut conn, prepared.method == HttpMethod::Head)?;
        conn.close();

        debug!(status = response.status, body_len = response.body.len(), "response received");
        status::classify(response)
    }
}
