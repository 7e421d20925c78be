//! Request signing for the `Authorization` header.
//!
//! # Design
//! The dispatcher hands the signer the exact method, resource (path plus
//! query) and body bytes it is about to transmit, together with the
//! credentials currently held by the client. Signers are injected as
//! `Arc<dyn RequestSigner>`; any `Fn(&SigningRequest) -> String` closure is
//! accepted, which keeps test doubles trivial.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Credentials;
use crate::http::HttpMethod;

type HmacSha256 = Hmac<Sha256>;

/// Everything a signer may cover. `resource` and `body` are the bytes that go
/// on the wire.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub method: &'a HttpMethod,
    pub resource: &'a str,
    pub body: Option<&'a [u8]>,
    pub credentials: &'a Credentials,
}

/// Computes the `Authorization` header value for one request.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &SigningRequest<'_>) -> String;
}

impl<F> RequestSigner for F
where
    F: Fn(&SigningRequest<'_>) -> String + Send + Sync,
{
    fn sign(&self, request: &SigningRequest<'_>) -> String {
        self(request)
    }
}

/// HMAC-SHA256 signer for the service's `MtWilson` authorization scheme.
///
/// The header looks like
/// `MtWilson realm="Attestation", username="admin", nonce="…",
/// signature_method="HMAC-SHA256", timestamp="…", signature="…"` where the
/// signature is keyed with the password and covers the request method,
/// resource, every header attribute and the body.
#[derive(Debug, Clone)]
pub struct HmacSigner {
    realm: String,
}

impl HmacSigner {
    pub const SCHEME: &'static str = "MtWilson";
    pub const SIGNATURE_METHOD: &'static str = "HMAC-SHA256";

    pub fn new(realm: impl Into<String>) -> Self {
        Self { realm: realm.into() }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Sign with a caller-chosen nonce and timestamp.
    ///
    /// Attribute values are written as HTTP quoted-strings, so a `"` or `\`
    /// in the realm or user name is backslash-escaped. The signature covers
    /// the unescaped values.
    pub fn authorization(&self, request: &SigningRequest<'_>, nonce: &str, timestamp: &str) -> String {
        let signature = self.signature(request, nonce, timestamp);
        format!(
            "{} realm={}, username={}, nonce={}, signature_method={}, timestamp={}, signature={}",
            Self::SCHEME,
            quoted(&self.realm),
            quoted(&request.credentials.user),
            quoted(nonce),
            quoted(Self::SIGNATURE_METHOD),
            quoted(timestamp),
            quoted(&signature)
        )
    }

    /// Base64 HMAC over the canonical form of `request`.
    pub fn signature(&self, request: &SigningRequest<'_>, nonce: &str, timestamp: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(request.credentials.password.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(&self.canonical(request, nonce, timestamp));
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn canonical(&self, request: &SigningRequest<'_>, nonce: &str, timestamp: &str) -> Vec<u8> {
        let mut out = format!(
            "request-method: {}\n\
             http-request-url: {}\n\
             realm: {}\n\
             username: {}\n\
             nonce: {}\n\
             signature-method: {}\n\
             timestamp: {}\n\
             \n",
            request.method.as_str(),
            request.resource,
            self.realm,
            request.credentials.user,
            nonce,
            Self::SIGNATURE_METHOD,
            timestamp
        )
        .into_bytes();
        if let Some(body) = request.body {
            out.extend_from_slice(body);
        }
        out
    }
}

fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl Default for HmacSigner {
    fn default() -> Self {
        Self::new("Attestation")
    }
}

impl RequestSigner for HmacSigner {
    fn sign(&self, request: &SigningRequest<'_>) -> String {
        let nonce = STANDARD.encode(Uuid::new_v4().as_bytes());
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.authorization(request, &nonce, &timestamp)
    }
}
