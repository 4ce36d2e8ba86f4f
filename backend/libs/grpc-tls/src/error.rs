//! TLS error types

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

pub type TlsResult<T> = Result<T, TlsError>;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("ambiguous credential configuration: certificate files and a CA issuer are both set")]
    AmbiguousConfiguration,

    #[error("no usable security configuration: set certificate files, a CA issuer, or insecure = true")]
    NoUsableConfiguration,

    #[error("incomplete certificate pair: both certificate and key paths are required")]
    IncompleteKeyPair,

    #[error("invalid issuer URL {url}: {reason}")]
    InvalidIssuerUrl { url: String, reason: String },

    #[error("failed to read {path:?}: {source}")]
    CertificateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    CertificateWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid certificate material: {0}")]
    InvalidCertificate(String),

    #[error("certificate expired at {0}")]
    CertificateExpired(DateTime<Utc>),

    #[error("certificate issuer request failed: {0}")]
    Issuer(String),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
}
