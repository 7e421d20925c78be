//! rustls client configuration built from `ConnectionConfig`.
//!
//! Two trust modes exist:
//! - `ca_file` set: the server chain must validate against that bundle.
//! - `ca_file` unset: **no server certificate validation at all**. Any peer
//!   is accepted, so the connection is open to interception. Handshake
//!   signatures are still checked, which proves only that the peer holds the
//!   key of whatever certificate it sent. Do not use this in production.
//!
//! In both modes the configured client certificate is presented.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;

type ClientIdentity = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

/// Build the TLS client configuration for one connection.
pub fn client_config(config: &ConnectionConfig) -> Result<Arc<ClientConfig>, ConnectionError> {
    let provider = Arc::new(crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

    let builder = match &config.ca_file {
        Some(ca_file) => builder.with_root_certificates(load_roots(ca_file)?),
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier { provider })),
    };

    let tls = match client_identity(config)? {
        Some((certs, key)) => builder.with_client_auth_cert(certs, key)?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(tls))
}

fn load_roots(path: &Path) -> Result<RootCertStore, ConnectionError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path, "CA bundle")? {
        roots.add(cert)?;
    }
    Ok(roots)
}

fn client_identity(config: &ConnectionConfig) -> Result<Option<ClientIdentity>, ConnectionError> {
    match (&config.cert_file, &config.key_file) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(ConnectionError::MissingClientCertificate),
        (Some(cert_file), key_file) => {
            let certs = load_certs(cert_file, "client certificate")?;
            let key_path = key_file.as_deref().unwrap_or(cert_file.as_path());
            let key = PrivateKeyDer::from_pem_file(key_path).map_err(|e| ConnectionError::Pem {
                what: "client private key",
                path: key_path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Ok(Some((certs, key)))
        }
    }
}

fn load_certs(path: &Path, what: &'static str) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    let pem_error = |reason: String| ConnectionError::Pem {
        what,
        path: path.to_path_buf(),
        reason,
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| pem_error(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pem_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(pem_error("no certificates found".to_string()));
    }
    Ok(certs)
}

/// Accepts any server certificate.
#[derive(Debug)]
struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
