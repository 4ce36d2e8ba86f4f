//! Auto-renewing server certificates
//!
//! The current certificate lives behind a rustls [`ResolvesServerCert`], so
//! every handshake picks up the latest one. A background task re-issues the
//! certificate a day ([`RENEWAL_WINDOW_SECS`]) before it expires.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::config::IssuerConfig;
use crate::error::TlsResult;
use crate::issuer::PkiClient;

/// How long before expiry a certificate is re-issued
pub const RENEWAL_WINDOW_SECS: i64 = 24 * 3600;

/// Floor between renewal attempts, also the retry delay after a failure
pub const MIN_RENEWAL_DELAY: Duration = Duration::from_secs(60);

/// Serves whichever certificate was stored last
#[derive(Debug)]
pub struct RotatingCertResolver {
    current: RwLock<Arc<CertifiedKey>>,
}

impl RotatingCertResolver {
    pub fn new(initial: Arc<CertifiedKey>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn current(&self) -> Arc<CertifiedKey> {
        self.current.read().clone()
    }

    pub fn store(&self, key: Arc<CertifiedKey>) {
        *self.current.write() = key;
    }
}

impl ResolvesServerCert for RotatingCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.current())
    }
}

/// Delay until the next renewal of a certificate expiring at `not_after`
pub fn renewal_delay(not_after: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (not_after - chrono::Duration::seconds(RENEWAL_WINDOW_SECS) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_RENEWAL_DELAY)
}

/// rustls server configuration for gRPC (HTTP/2 only) over `resolver`
pub fn server_config(resolver: Arc<dyn ResolvesServerCert>) -> TlsResult<ServerConfig> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(config)
}

/// CA-issued credentials with a live renewal task
///
/// Dropping the value stops renewal; handshakes already configured keep
/// serving the last certificate.
pub struct RotatingCredentials {
    resolver: Arc<RotatingCertResolver>,
    acceptor: TlsAcceptor,
    renewal: JoinHandle<()>,
}

impl RotatingCredentials {
    /// Issue the first certificate and spawn the renewal task
    pub async fn start(config: &IssuerConfig) -> TlsResult<Self> {
        let client = PkiClient::new(config)?;
        let issued = client.issue().await?;

        info!(
            common_name = %config.common_name,
            not_after = %issued.not_after,
            issuer = %client.issue_url(),
            "server certificate issued"
        );

        let resolver = Arc::new(RotatingCertResolver::new(issued.certified_key));
        let acceptor = TlsAcceptor::from(Arc::new(server_config(resolver.clone())?));
        let renewal = tokio::spawn(renew(client, resolver.clone(), issued.not_after));

        Ok(Self {
            resolver,
            acceptor,
            renewal,
        })
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }

    pub fn resolver(&self) -> &Arc<RotatingCertResolver> {
        &self.resolver
    }
}

impl Drop for RotatingCredentials {
    fn drop(&mut self) {
        self.renewal.abort();
    }
}

impl std::fmt::Debug for RotatingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingCredentials").finish_non_exhaustive()
    }
}

async fn renew(client: PkiClient, resolver: Arc<RotatingCertResolver>, mut not_after: DateTime<Utc>) {
    loop {
        let delay = renewal_delay(not_after, Utc::now());
        debug!(delay_secs = delay.as_secs(), "next certificate renewal scheduled");
        tokio::time::sleep(delay).await;

        match client.issue().await {
            Ok(issued) => {
                resolver.store(issued.certified_key);
                not_after = issued.not_after;
                info!(%not_after, "server certificate renewed");
            }
            Err(e) => {
                warn!(error = %e, "certificate renewal failed; retrying");
            }
        }
    }
}
