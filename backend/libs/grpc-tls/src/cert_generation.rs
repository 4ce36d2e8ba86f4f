//! Certificate Generation for Development and Testing
//!
//! Generates self-signed certificates for local listeners and test fixtures.
//! **WARNING**: NEVER use in production - configure real certificate files or
//! a CA issuer instead.

use chrono::{Datelike, Duration, Utc};
use rcgen::{date_time_ymd, CertificateParams, DistinguishedName, DnType, KeyPair};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{TlsError, TlsResult};

/// A self-signed certificate and its key
#[derive(Clone)]
pub struct SelfSignedBundle {
    /// Certificate (PEM); doubles as its own CA
    pub cert_pem: String,
    /// Private key (PEM)
    pub key_pem: String,
}

/// Generate a self-signed certificate for `common_name`, `localhost` and
/// `127.0.0.1`, valid until now + `valid_for` (date granularity)
pub fn generate_self_signed(common_name: &str, valid_for: Duration) -> TlsResult<SelfSignedBundle> {
    let mut params = CertificateParams::new(vec![
        common_name.to_string(),
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])?;

    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "Federation Development");

    let expiry = (Utc::now() + valid_for).date_naive();
    params.not_after = date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    info!(common_name, %expiry, "generated self-signed certificate");

    Ok(SelfSignedBundle {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Write the bundle as `server.crt` / `server.key` under `output_dir`
pub fn write_bundle(bundle: &SelfSignedBundle, output_dir: &Path) -> TlsResult<(PathBuf, PathBuf)> {
    let write = |path: PathBuf, contents: &str| match fs::write(&path, contents) {
        Ok(()) => Ok(path),
        Err(source) => Err(TlsError::CertificateWriteError { path, source }),
    };

    fs::create_dir_all(output_dir).map_err(|source| TlsError::CertificateWriteError {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let cert_path = write(output_dir.join("server.crt"), &bundle.cert_pem)?;
    let key_path = write(output_dir.join("server.key"), &bundle.key_pem)?;

    info!(output_dir = ?output_dir, "certificate bundle written to disk");
    Ok((cert_path, key_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_self_signed() {
        let bundle = generate_self_signed("rpcd.local", Duration::days(30)).unwrap();
        assert!(bundle.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(bundle.key_pem.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_write_bundle() {
        let bundle = generate_self_signed("rpcd.local", Duration::days(30)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let (cert, key) = write_bundle(&bundle, &dir.path().join("certs")).unwrap();

        assert_eq!(fs::read_to_string(cert).unwrap(), bundle.cert_pem);
        assert_eq!(fs::read_to_string(key).unwrap(), bundle.key_pem);
    }
}
