//! Transport credential construction

use std::fs;
use std::path::{Path, PathBuf};
use tonic::transport::{Certificate, Identity, ServerTlsConfig};
use tracing::{info, warn};

use crate::config::{TransportSecurity, TransportSecurityConfig};
use crate::error::{TlsError, TlsResult};
use crate::expiry::{check_certificate_expiry, EXPIRY_WARNING_DAYS};
use crate::rotation::RotatingCredentials;

/// Credentials ready to be attached to the listener
pub enum Credentials {
    /// No transport encryption
    Plaintext,
    /// Certificate and key loaded once from disk
    Static(ServerTlsConfig),
    /// CA-issued certificate renewed in the background
    Rotating(RotatingCredentials),
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Plaintext => "plaintext",
            Credentials::Static(_) => "static",
            Credentials::Rotating(_) => "ca-issued",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credentials").field(&self.kind()).finish()
    }
}

/// Resolve the configuration and produce listener credentials
pub async fn build_credentials(config: &TransportSecurityConfig) -> TlsResult<Credentials> {
    match config.resolve()? {
        TransportSecurity::Insecure => {
            warn!("transport security disabled - serving plaintext");
            Ok(Credentials::Plaintext)
        }
        TransportSecurity::SelfSigned { cert, key, ca } => {
            load_static(&cert, &key, ca.as_deref()).map(Credentials::Static)
        }
        TransportSecurity::CaIssued(issuer) => {
            RotatingCredentials::start(&issuer).await.map(Credentials::Rotating)
        }
    }
}

fn load_static(cert_path: &Path, key_path: &Path, client_ca: Option<&Path>) -> TlsResult<ServerTlsConfig> {
    let cert_pem = read_pem(cert_path)?;
    let key_pem = read_pem(key_path)?;

    // Fail at startup rather than on the first handshake
    rustls_pemfile::private_key(&mut key_pem.as_bytes())
        .ok()
        .flatten()
        .ok_or_else(|| TlsError::InvalidCertificate(format!("no private key in {}", key_path.display())))?;

    check_certificate_expiry(&cert_pem, EXPIRY_WARNING_DAYS)?;

    let mut tls = ServerTlsConfig::new().identity(Identity::from_pem(&cert_pem, &key_pem));

    if let Some(ca_path) = client_ca {
        let ca_pem = read_pem(ca_path)?;
        tls = tls.client_ca_root(Certificate::from_pem(ca_pem));
    }

    info!(
        cert = ?cert_path,
        client_ca = ?client_ca,
        "server TLS configuration loaded"
    );

    Ok(tls)
}

fn read_pem(path: &Path) -> TlsResult<String> {
    fs::read_to_string(path).map_err(|source| TlsError::CertificateReadError {
        path: PathBuf::from(path),
        source,
    })
}
