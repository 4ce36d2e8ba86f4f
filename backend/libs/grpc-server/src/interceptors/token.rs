use token_manager::TOKEN_HEADER;
use tonic::{Request, Status};

use super::Interceptor;
use crate::context::AccessToken;

const BEARER_PREFIX: &str = "Bearer ";

/// Moves the bearer token into an [`AccessToken`] extension
///
/// `x-access-token` wins over `authorization: Bearer <token>`. A call
/// without either passes through untouched; rejecting it is up to the
/// auth interceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenExtractor;

impl Interceptor for TokenExtractor {
    fn intercept(&self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(token) = extract_token(&request) {
            request.extensions_mut().insert(AccessToken(token));
        }
        Ok(request)
    }
}

fn extract_token<T>(request: &Request<T>) -> Option<String> {
    let metadata = request.metadata();

    if let Some(token) = metadata.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    metadata
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
