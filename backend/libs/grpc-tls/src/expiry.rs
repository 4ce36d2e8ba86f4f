//! Certificate validity inspection

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};
use x509_parser::prelude::*;

use crate::error::{TlsError, TlsResult};

/// Days of remaining validity below which a warning is logged
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// `notAfter` of the first certificate in a PEM document
pub fn certificate_not_after(cert_pem: &str) -> TlsResult<DateTime<Utc>> {
    let pem = ::pem::parse(cert_pem)
        .map_err(|e| TlsError::InvalidCertificate(format!("failed to parse PEM: {e}")))?;

    let (_, cert) = X509Certificate::from_der(pem.contents())
        .map_err(|e| TlsError::InvalidCertificate(format!("failed to parse X.509 certificate: {e}")))?;

    let timestamp = cert.validity().not_after.timestamp();
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| TlsError::InvalidCertificate(format!("notAfter out of range: {timestamp}")))
}

/// Reject expired certificates and warn when expiry is near
pub fn check_certificate_expiry(cert_pem: &str, warn_days_before: i64) -> TlsResult<DateTime<Utc>> {
    let not_after = certificate_not_after(cert_pem)?;
    let days_until_expiry = (not_after - Utc::now()).num_days();

    if not_after <= Utc::now() {
        return Err(TlsError::CertificateExpired(not_after));
    }

    if days_until_expiry < warn_days_before {
        warn!(
            days_remaining = days_until_expiry,
            %not_after,
            "certificate expiring soon - rotation recommended"
        );
    } else {
        info!(days_until_expiry, "certificate validity check passed");
    }

    Ok(not_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert_generation::generate_self_signed;
    use chrono::Duration;

    #[test]
    fn test_valid_certificate() {
        let bundle = generate_self_signed("localhost", Duration::days(365)).unwrap();
        let not_after = check_certificate_expiry(&bundle.cert_pem, EXPIRY_WARNING_DAYS).unwrap();
        assert!(not_after > Utc::now() + Duration::days(300));
    }

    #[test]
    fn test_expired_certificate() {
        let bundle = generate_self_signed("localhost", Duration::days(-2)).unwrap();
        assert!(matches!(
            check_certificate_expiry(&bundle.cert_pem, EXPIRY_WARNING_DAYS),
            Err(TlsError::CertificateExpired(_))
        ));
    }

    #[test]
    fn test_garbage_pem() {
        assert!(matches!(
            certificate_not_after("not a certificate"),
            Err(TlsError::InvalidCertificate(_))
        ));
    }
}
