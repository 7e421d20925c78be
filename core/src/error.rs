//! Error types for the attestation API client.
//!
//! # Design
//! `ApiError` is the closed set of outcomes a failed `execute` can produce.
//! Transport problems (DNS, TCP, TLS, malformed responses) all collapse into
//! `Connection` so callers can tell "never reached the service" apart from
//! "the service answered with an error status". Every HTTP variant keeps the
//! status code and the raw body for diagnostics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Number of characters of a response body shown by `Display`.
const EXCERPT_CHARS: usize = 200;

/// Errors returned by `AttestationClient::execute`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed a round-trip with the server.
    #[error("unable to connect to server: {0}")]
    Connection(#[from] ConnectionError),

    /// 401 or 403.
    #[error("not authorized (HTTP {status})")]
    NotAuthorized { status: u16, body: String },

    /// 404.
    #[error("resource not found")]
    NotFound { status: u16, body: String },

    /// 409: the resource already exists.
    #[error("duplicate resource: {}", excerpt(.detail))]
    Duplicate { status: u16, detail: String },

    /// 400: the server rejected the request payload or parameters.
    #[error("invalid request: {}", excerpt(.detail))]
    Invalid { status: u16, detail: String },

    /// 500.
    #[error("internal server error: {}", excerpt(.detail))]
    InternalError { status: u16, detail: String },

    /// Any other non-success status.
    #[error("unknown error occurred (HTTP {status}): {}", excerpt(.detail))]
    UnknownError { status: u16, detail: String },

    /// The request cannot be written as HTTP/1.1: a header name that is not
    /// a token, a header value with control characters, or a resource that
    /// is not an origin-form target. Raised before signing and connecting.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A successful response body could not be decoded. Only produced by
    /// `HttpResponse::json`, never by `execute`.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotAuthorized { status, .. }
            | ApiError::NotFound { status, .. }
            | ApiError::Duplicate { status, .. }
            | ApiError::Invalid { status, .. }
            | ApiError::InternalError { status, .. }
            | ApiError::UnknownError { status, .. } => Some(*status),
            ApiError::Connection(_) | ApiError::MalformedRequest(_) | ApiError::Deserialization(_) => None,
        }
    }

    /// Response body returned alongside the error status.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::NotAuthorized { body, .. } | ApiError::NotFound { body, .. } => Some(body),
            ApiError::Duplicate { detail, .. }
            | ApiError::Invalid { detail, .. }
            | ApiError::InternalError { detail, .. }
            | ApiError::UnknownError { detail, .. } => Some(detail),
            ApiError::Connection(_) | ApiError::MalformedRequest(_) | ApiError::Deserialization(_) => None,
        }
    }
}

/// Transport-level failures. Always surfaced as `ApiError::Connection`.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    #[error("failed to load {what} from {}: {reason}", .path.display())]
    Pem {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("client key file configured without a certificate file")]
    MissingClientCertificate,

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
}

/// Leading part of a response body, cut on a character boundary.
pub(crate) fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
