//! gRPC transport credentials
//!
//! Exactly one strategy secures the listener:
//! - plaintext, only when explicitly requested
//! - a certificate and key loaded from disk (optionally verifying clients)
//! - a certificate issued by a Vault-style PKI and renewed before expiry
//!
//! Configuration is resolved into [`TransportSecurity`] up front, so mixing
//! strategies fails at load time instead of at the first handshake.

pub mod cert_generation;
pub mod config;
pub mod credentials;
pub mod error;
pub mod expiry;
pub mod incoming;
pub mod issuer;
pub mod rotation;

pub use cert_generation::{generate_self_signed, write_bundle, SelfSignedBundle};
pub use config::{validate_issuer_url, IssuerConfig, TransportSecurity, TransportSecurityConfig};
pub use credentials::{build_credentials, Credentials};
pub use error::{TlsError, TlsResult};
pub use expiry::{certificate_not_after, check_certificate_expiry, EXPIRY_WARNING_DAYS};
pub use incoming::tls_incoming;
pub use issuer::{certified_key_from_pem, IssuedCertificate, PkiClient};
pub use rotation::{renewal_delay, RotatingCertResolver, RotatingCredentials};
