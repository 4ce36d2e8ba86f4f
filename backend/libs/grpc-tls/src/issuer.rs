//! Client for a Vault-style PKI certificate authority
//!
//! Issues server certificates with
//! `POST {url}/v1/{mount}/issue/{role}` authenticated by `X-Vault-Token`.

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{validate_issuer_url, IssuerConfig};
use crate::error::{TlsError, TlsResult};
use crate::expiry::certificate_not_after;

const ISSUE_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Serialize)]
struct IssueRequest<'a> {
    common_name: &'a str,
    ttl: &'a str,
}

#[derive(Deserialize)]
struct IssueResponse {
    data: IssueData,
}

#[derive(Deserialize)]
struct IssueData {
    certificate: String,
    private_key: String,
    #[serde(default)]
    issuing_ca: String,
    #[serde(default)]
    ca_chain: Vec<String>,
}

/// A freshly issued certificate, ready for the TLS stack
pub struct IssuedCertificate {
    pub certified_key: Arc<CertifiedKey>,
    pub not_after: DateTime<Utc>,
}

/// Issues certificates for one role and common name
#[derive(Clone)]
pub struct PkiClient {
    http: Client,
    issue_url: Url,
    token: String,
    common_name: String,
    ttl: String,
}

impl std::fmt::Debug for PkiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkiClient")
            .field("issue_url", &self.issue_url.as_str())
            .field("common_name", &self.common_name)
            .finish_non_exhaustive()
    }
}

impl PkiClient {
    /// Validate the issuer URL and trust the configured CA bundle
    pub fn new(config: &IssuerConfig) -> TlsResult<Self> {
        let base = validate_issuer_url(&config.url)?;
        let issue_url = base
            .join(&format!(
                "v1/{}/issue/{}",
                config.mount.trim_matches('/'),
                config.role
            ))
            .map_err(|e| TlsError::InvalidIssuerUrl {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

        // The authority is reached directly, never through an HTTP proxy
        let mut builder = Client::builder().timeout(ISSUE_TIMEOUT).no_proxy();

        if let Some(ca_file) = &config.ca_file {
            let pem = fs::read(ca_file).map_err(|source| TlsError::CertificateReadError {
                path: ca_file.clone(),
                source,
            })?;
            let ca = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TlsError::InvalidCertificate(format!("{}: {e}", ca_file.display())))?;
            builder = builder.add_root_certificate(ca);
        }

        let http = builder
            .build()
            .map_err(|e| TlsError::Issuer(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            issue_url,
            token: config.token.clone(),
            common_name: config.common_name.clone(),
            ttl: config.ttl.clone(),
        })
    }

    pub fn issue_url(&self) -> &Url {
        &self.issue_url
    }

    /// Request a new certificate and key
    pub async fn issue(&self) -> TlsResult<IssuedCertificate> {
        let response = self
            .http
            .post(self.issue_url.clone())
            .header(TOKEN_HEADER, &self.token)
            .json(&IssueRequest {
                common_name: &self.common_name,
                ttl: &self.ttl,
            })
            .send()
            .await
            .map_err(|e| TlsError::Issuer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TlsError::Issuer(format!("{status}: {body}")));
        }

        let IssueResponse { data } = response
            .json()
            .await
            .map_err(|e| TlsError::Issuer(format!("malformed issue response: {e}")))?;

        let mut chain_pem = data.certificate;
        if data.ca_chain.is_empty() {
            if !data.issuing_ca.is_empty() {
                chain_pem.push('\n');
                chain_pem.push_str(&data.issuing_ca);
            }
        } else {
            for ca in &data.ca_chain {
                chain_pem.push('\n');
                chain_pem.push_str(ca);
            }
        }

        let not_after = certificate_not_after(&chain_pem)?;
        let certified_key = certified_key_from_pem(&chain_pem, &data.private_key)?;

        debug!(common_name = %self.common_name, %not_after, "certificate issued");

        Ok(IssuedCertificate {
            certified_key,
            not_after,
        })
    }
}

/// Load a PEM chain and private key into a rustls signing identity
pub fn certified_key_from_pem(chain_pem: &str, key_pem: &str) -> TlsResult<Arc<CertifiedKey>> {
    let chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut chain_pem.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::InvalidCertificate(format!("certificate chain: {e}")))?;

    if chain.is_empty() {
        return Err(TlsError::InvalidCertificate("no certificate found".to_string()));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_bytes())
        .map_err(|e| TlsError::InvalidCertificate(format!("private key: {e}")))?
        .ok_or_else(|| TlsError::InvalidCertificate("no private key found".to_string()))?;

    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)?;

    Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
}
