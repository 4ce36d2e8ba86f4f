//! Transport security configuration
//!
//! The raw configuration block allows any combination of fields. It is
//! resolved once, at load time, into exactly one [`TransportSecurity`]
//! strategy; conflicting or empty combinations are rejected there.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{TlsError, TlsResult};

/// Credential fields as they appear in the server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSecurityConfig {
    /// Serve plaintext when nothing else is configured
    #[serde(default)]
    pub insecure: bool,

    /// Server certificate chain (PEM)
    #[serde(default)]
    pub certificate: Option<PathBuf>,

    /// Server private key (PEM)
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// CA used to verify client certificates
    #[serde(default)]
    pub client_ca: Option<PathBuf>,

    /// External certificate authority
    #[serde(default)]
    pub issuer: Option<IssuerConfig>,
}

fn default_mount() -> String {
    "pki".to_string()
}

fn default_ttl() -> String {
    "72h".to_string()
}

/// Vault-style PKI issuer settings
#[derive(Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Base URL of the authority, e.g. `https://vault.internal:8200`
    pub url: String,
    /// Token sent as `X-Vault-Token`
    pub token: String,
    /// PKI role to issue against
    pub role: String,
    /// CA bundle used to verify the authority itself
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Subject common name requested for the server certificate
    pub common_name: String,
    /// Requested lifetime, in the authority's duration syntax
    #[serde(default = "default_ttl")]
    pub ttl: String,
    /// PKI secrets engine mount
    #[serde(default = "default_mount")]
    pub mount: String,
}

impl fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .field("ca_file", &self.ca_file)
            .field("common_name", &self.common_name)
            .field("ttl", &self.ttl)
            .field("mount", &self.mount)
            .finish()
    }
}

/// The single credential strategy selected for the listener
#[derive(Debug, Clone)]
pub enum TransportSecurity {
    Insecure,
    SelfSigned {
        cert: PathBuf,
        key: PathBuf,
        ca: Option<PathBuf>,
    },
    CaIssued(IssuerConfig),
}

impl TransportSecurityConfig {
    pub fn insecure() -> Self {
        Self {
            insecure: true,
            ..Self::default()
        }
    }

    /// Pick exactly one strategy
    ///
    /// Certificate files and an issuer together are ambiguous regardless of
    /// `insecure`; `insecure` only applies when neither is set.
    pub fn resolve(&self) -> TlsResult<TransportSecurity> {
        let has_files = self.certificate.is_some() || self.key.is_some();

        match (has_files, &self.issuer, self.insecure) {
            (true, Some(_), _) => Err(TlsError::AmbiguousConfiguration),
            (true, None, _) => {
                let (Some(cert), Some(key)) = (&self.certificate, &self.key) else {
                    return Err(TlsError::IncompleteKeyPair);
                };
                Ok(TransportSecurity::SelfSigned {
                    cert: cert.clone(),
                    key: key.clone(),
                    ca: self.client_ca.clone(),
                })
            }
            (false, Some(issuer), _) => {
                validate_issuer_url(&issuer.url)?;
                Ok(TransportSecurity::CaIssued(issuer.clone()))
            }
            (false, None, true) => Ok(TransportSecurity::Insecure),
            (false, None, false) => Err(TlsError::NoUsableConfiguration),
        }
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_issuer_url(raw: &str) -> TlsResult<Url> {
    let invalid = |reason: &str| TlsError::InvalidIssuerUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> IssuerConfig {
        IssuerConfig {
            url: "https://vault.internal:8200".to_string(),
            token: "s.secret".to_string(),
            role: "rpcd".to_string(),
            ca_file: None,
            common_name: "rpcd.internal".to_string(),
            ttl: default_ttl(),
            mount: default_mount(),
        }
    }

    #[test]
    fn test_files_and_issuer_are_ambiguous() {
        for insecure in [false, true] {
            let config = TransportSecurityConfig {
                insecure,
                certificate: Some("server.crt".into()),
                key: Some("server.key".into()),
                issuer: Some(issuer()),
                ..Default::default()
            };
            assert!(matches!(config.resolve(), Err(TlsError::AmbiguousConfiguration)));
        }
    }

    #[test]
    fn test_files_win_over_insecure() {
        let config = TransportSecurityConfig {
            insecure: true,
            certificate: Some("server.crt".into()),
            key: Some("server.key".into()),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Ok(TransportSecurity::SelfSigned { .. })));
    }

    #[test]
    fn test_half_a_pair_is_rejected() {
        let config = TransportSecurityConfig {
            certificate: Some("server.crt".into()),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(TlsError::IncompleteKeyPair)));
    }

    #[test]
    fn test_issuer_only() {
        let config = TransportSecurityConfig {
            issuer: Some(issuer()),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Ok(TransportSecurity::CaIssued(_))));
    }

    #[test]
    fn test_insecure_and_nothing() {
        assert!(matches!(
            TransportSecurityConfig::insecure().resolve(),
            Ok(TransportSecurity::Insecure)
        ));
        assert!(matches!(
            TransportSecurityConfig::default().resolve(),
            Err(TlsError::NoUsableConfiguration)
        ));
    }

    #[test]
    fn test_issuer_url_validation() {
        assert!(validate_issuer_url("https://vault:8200").is_ok());
        assert!(validate_issuer_url("http://127.0.0.1:8200/").is_ok());
        assert!(validate_issuer_url("vault:8200").is_err());
        assert!(validate_issuer_url("ftp://vault").is_err());
        assert!(validate_issuer_url("not a url").is_err());
    }

    #[test]
    fn test_issuer_debug_redacts_token() {
        let rendered = format!("{:?}", issuer());
        assert!(!rendered.contains("s.secret"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: TransportSecurityConfig = serde_json::from_str(
            r#"{"issuer": {"url": "https://vault:8200", "token": "t", "role": "r", "common_name": "cn"}}"#,
        )
        .unwrap();
        let issuer = config.issuer.unwrap();
        assert_eq!(issuer.mount, "pki");
        assert_eq!(issuer.ttl, "72h");
        assert!(!config.insecure);
    }
}
