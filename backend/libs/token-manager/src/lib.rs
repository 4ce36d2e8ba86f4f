//! Access token minting and verification
//!
//! Tokens are HS256-signed JWTs carrying a principal and its scopes. The
//! manager is stateless: nothing is stored between calls, so it can be cloned
//! into every interceptor and service that needs it.
//!
//! ## Usage
//!
//! ```rust
//! use token_manager::{owner_scope, Principal, TokenConfig, TokenManager};
//!
//! # fn main() -> Result<(), token_manager::TokenError> {
//! let manager = TokenManager::new(TokenConfig::with_secret("J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W"))?;
//!
//! let alice = Principal::new("https://idp.example.org", "4c510ada", "alice");
//! let token = manager.mint(&alice, &owner_scope())?;
//!
//! let (principal, scopes) = manager.verify(&token)?;
//! assert_eq!(principal, alice);
//! assert!(scopes.contains_key("user"));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

mod claims;
pub mod secret_strength;

pub use claims::{owner_scope, Principal, Scope, Scopes, UserId, UserType, USER_SCOPE};
pub use secret_strength::{classify_secret, SecretStrength};

use claims::Claims;

/// Audience every token is minted for and checked against
pub const AUDIENCE: &str = "federation";

/// Metadata key carrying the access token between services
pub const TOKEN_HEADER: &str = "x-access-token";

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;
const DEFAULT_EXPIRES_SECS: u64 = 24 * 3600;

/// Longest accepted token lifetime, ten years
pub const MAX_EXPIRES_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token lifetime: {0}")]
    InvalidTtl(String),
}

pub type Result<T> = std::result::Result<T, TokenError>;

fn default_expires_secs() -> u64 {
    DEFAULT_EXPIRES_SECS
}

/// Token manager configuration block
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Shared HS256 secret
    #[serde(default)]
    pub secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_expires_secs")]
    pub expires_secs: u64,

    /// Expire at the end of the coming weekend instead of after `expires_secs`
    #[serde(default)]
    pub expires_next_weekend: bool,
}

impl TokenConfig {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_secs: DEFAULT_EXPIRES_SECS,
            expires_next_weekend: false,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::with_secret(String::new())
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("expires_secs", &self.expires_secs)
            .field("expires_next_weekend", &self.expires_next_weekend)
            .finish()
    }
}

/// Stateless HS256 token signer/verifier
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires: Duration,
    expires_next_weekend: bool,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("expires", &self.expires)
            .field("expires_next_weekend", &self.expires_next_weekend)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Build a manager from configuration
    ///
    /// ## Errors
    ///
    /// `TokenError::MissingSecret` if the secret is empty,
    /// `TokenError::InvalidTtl` if `expires_secs` is zero or above
    /// [`MAX_EXPIRES_SECS`].
    pub fn new(config: TokenConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let expires = ttl(config.expires_secs)?;

        if classify_secret(&config.secret) == SecretStrength::Weak {
            warn!("token signing secret is weak; use at least 32 random bytes");
        }

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            expires,
            expires_next_weekend: config.expires_next_weekend,
        })
    }

    /// Mint a token for `principal` carrying `scopes`, issued now
    pub fn mint(&self, principal: &Principal, scopes: &Scopes) -> Result<String> {
        self.mint_at(principal, scopes, Utc::now())
    }

    /// Mint a token as if issued at `issued_at`
    pub fn mint_at(
        &self,
        principal: &Principal,
        scopes: &Scopes,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            iss: principal.id.idp.clone(),
            aud: AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: self.expires_at(issued_at)?.timestamp(),
            user: principal.clone(),
            scope: scopes.clone(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, audience and expiry; return the principal and its scopes
    pub fn verify(&self, token: &str) -> Result<(Principal, Scopes)> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidCredentials(e.to_string()),
            }
        })?;

        debug!(
            user = %data.claims.user.username,
            issuer = %data.claims.iss,
            scopes = data.claims.scope.len(),
            "token verified"
        );

        Ok((data.claims.user, data.claims.scope))
    }

    /// Expiry for a token issued at `issued_at` under this configuration
    ///
    /// ## Errors
    ///
    /// `TokenError::InvalidTtl` when the expiry is not representable.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if self.expires_next_weekend {
            return Ok(end_of_next_weekend(issued_at));
        }

        issued_at
            .checked_add_signed(self.expires)
            .ok_or_else(|| TokenError::InvalidTtl(format!("{issued_at} + {} overflows", self.expires)))
    }
}

fn ttl(expires_secs: u64) -> Result<Duration> {
    if expires_secs == 0 || expires_secs > MAX_EXPIRES_SECS {
        return Err(TokenError::InvalidTtl(format!(
            "expires_secs must be between 1 and {MAX_EXPIRES_SECS}, got {expires_secs}"
        )));
    }

    i64::try_from(expires_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| TokenError::InvalidTtl(format!("expires_secs out of range: {expires_secs}")))
}

/// Sunday 23:59:59 UTC of the current week, or of the next week when
/// `now` is already a Sunday
pub fn end_of_next_weekend(now: DateTime<Utc>) -> DateTime<Utc> {
    let from_sunday = now.weekday().num_days_from_sunday() as i64;
    let days_to_sunday = if from_sunday == 0 { 7 } else { 7 - from_sunday };
    let following_monday = now.date_naive() + Duration::days(days_to_sunday + 1);

    Utc.from_utc_datetime(&following_monday.and_time(NaiveTime::MIN)) - Duration::seconds(1)
}
