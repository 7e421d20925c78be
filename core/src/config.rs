//! Connection settings for the attestation service.
//!
//! # Design
//! `ConnectionConfig` is built once and handed to `AttestationClient`, which
//! owns it. Only the credential pair is replaceable afterwards, and only as a
//! whole. The struct derives serde so deployments can keep it in a JSON file
//! next to the PEM material it points at.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User name and password presented to the request signer.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the attestation service.
///
/// With `use_tls` set and no `ca_file`, the server certificate is **not
/// verified**. That mode accepts any server, including an attacker in the
/// middle, and exists only for lab setups with self-signed certificates.
/// Never deploy it in production; configure `ca_file` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    #[serde(default)]
    pub credentials: Credentials,
    /// PEM private key presented for mutual TLS. Read from `cert_file` when unset.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// PEM client certificate chain presented for mutual TLS.
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    /// PEM bundle of trusted CAs used to verify the server.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Bounds TCP connection establishment only, not reads or writes.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

fn default_use_tls() -> bool {
    true
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: default_use_tls(),
            credentials: Credentials::default(),
            key_file: None,
            cert_file: None,
            ca_file: None,
            connect_timeout_ms: None,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Client identity for mutual TLS. Pass `None` as `key_file` when the key
    /// lives in the same PEM file as the certificate.
    pub fn with_client_identity(mut self, key_file: Option<&Path>, cert_file: &Path) -> Self {
        self.key_file = key_file.map(Path::to_path_buf);
        self.cert_file = Some(cert_file.to_path_buf());
        self
    }

    pub fn with_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// True when TLS is on but the server certificate will not be checked.
    pub fn is_insecure(&self) -> bool {
        self.use_tls && self.ca_file.is_none()
    }

    /// Value for the `Host` request header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
