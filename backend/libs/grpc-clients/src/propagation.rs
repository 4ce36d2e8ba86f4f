//! Outgoing access-token propagation
//!
//! Downstream calls carry the caller's token in the `x-access-token`
//! metadata entry, either forwarded unchanged from the inbound request or
//! freshly minted for the same principal.

use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Status};

use token_manager::{Principal, Scopes, TokenManager, TOKEN_HEADER};

/// Client interceptor that attaches an access token to every request
#[derive(Clone)]
pub struct TokenPropagator {
    token: AsciiMetadataValue,
}

impl TokenPropagator {
    /// Wrap an already-issued token
    ///
    /// ## Errors
    ///
    /// `Status::internal` if the token is not valid metadata ASCII.
    pub fn new(token: impl Into<String>) -> Result<Self, Status> {
        let token = AsciiMetadataValue::try_from(token.into())
            .map_err(|_| Status::internal("access token is not valid metadata"))?;
        Ok(Self { token })
    }

    /// Forward the token presented on an inbound request
    ///
    /// ## Errors
    ///
    /// `Status::unauthenticated` if the request carries no token.
    pub fn from_request<T>(request: &Request<T>) -> Result<Self, Status> {
        request
            .metadata()
            .get(TOKEN_HEADER)
            .cloned()
            .map(|token| Self { token })
            .ok_or_else(|| Status::unauthenticated("missing access token"))
    }

    /// Mint a new token for `principal` and propagate it
    pub fn mint(manager: &TokenManager, principal: &Principal, scopes: &Scopes) -> Result<Self, Status> {
        let token = manager
            .mint(principal, scopes)
            .map_err(|e| Status::internal(e.to_string()))?;
        Self::new(token)
    }

    pub fn token(&self) -> &AsciiMetadataValue {
        &self.token
    }
}

impl Interceptor for TokenPropagator {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request.metadata_mut().insert(TOKEN_HEADER, self.token.clone());
        Ok(request)
    }
}

impl std::fmt::Debug for TokenPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPropagator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_manager::{owner_scope, TokenConfig};

    #[test]
    fn test_attaches_token() {
        let mut propagator = TokenPropagator::new("eyJhbGciOiJIUzI1NiJ9.e30.sig").unwrap();
        let request = propagator.call(Request::new(())).unwrap();
        assert_eq!(
            request.metadata().get(TOKEN_HEADER).unwrap(),
            "eyJhbGciOiJIUzI1NiJ9.e30.sig"
        );
    }

    #[test]
    fn test_rejects_non_ascii_token() {
        assert!(TokenPropagator::new("tok\nen").is_err());
    }

    #[test]
    fn test_forward_from_inbound_request() {
        let mut inbound = Request::new(());
        assert_eq!(
            TokenPropagator::from_request(&inbound).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );

        inbound
            .metadata_mut()
            .insert(TOKEN_HEADER, AsciiMetadataValue::from_static("abc.def.ghi"));
        let propagator = TokenPropagator::from_request(&inbound).unwrap();
        assert_eq!(propagator.token(), "abc.def.ghi");
    }

    #[test]
    fn test_minted_token_verifies() {
        let manager = TokenManager::new(TokenConfig::with_secret("J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W")).unwrap();
        let alice = Principal::new("https://cloud.example.org", "a1", "alice");
        let propagator = TokenPropagator::mint(&manager, &alice, &owner_scope()).unwrap();
        let token = propagator.token().to_str().unwrap();
        assert_eq!(manager.verify(token).unwrap().0, alice);
    }
}
