//! Blocking, signed REST client for the attestation service.
//!
//! # Overview
//! Every call opens its own TCP or TLS connection (optionally mutually
//! authenticated), attaches an `Authorization` header computed by an
//! injected `RequestSigner`, frames the request with an exact
//! `Content-Length`, reads the whole response and maps the status code onto
//! `ApiError`.
//!
//! # Design
//! - `AttestationClient::prepare` builds the signed `HttpRequest` as plain
//!   data (no I/O); `execute` adds the network round-trip. The signed method,
//!   path, query and body are exactly what goes on the wire.
//! - No pooling, retries or background threads. The connect timeout bounds
//!   connection establishment only.
//! - TLS without a configured CA bundle skips server verification entirely.
//!   See [`ConnectionConfig`] before enabling it anywhere real.
//! - Logging goes through `tracing`; a client can carry its own `Dispatch`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod request;
pub mod signer;
pub mod status;
pub mod tls;
pub mod transport;

pub use client::AttestationClient;
pub use config::{ConnectionConfig, Credentials};
pub use error::{ApiError, ConnectionError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use params::{extract_params, Params};
pub use request::Request;
pub use signer::{HmacSigner, RequestSigner, SigningRequest};
