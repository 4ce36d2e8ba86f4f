//! Token authentication and scope authorization
//!
//! Every method outside the unprotected list needs a valid access token.
//! When a method appears in the permission map, at least one scope of the
//! token must hold a role whose capabilities cover the listed ones.

use access_control::PermissionSet;
use std::collections::HashMap;
use token_manager::{TokenError, TokenManager};
use tonic::{Request, Status};
use tracing::{debug, Span};

use super::{method_of, Interceptor};
use crate::config::MethodPermission;
use crate::context::{AccessToken, AuthContext};
use crate::error::ServerError;

/// Health checks never need a token
pub const HEALTH_PREFIX: &str = "/grpc.health.v1.Health/";

/// Reflection is served to anonymous tooling
pub const REFLECTION_PREFIXES: [&str; 2] = [
    "/grpc.reflection.v1.ServerReflection/",
    "/grpc.reflection.v1alpha.ServerReflection/",
];

pub struct AuthInterceptor {
    tokens: TokenManager,
    unprotected: Vec<String>,
    method_permissions: HashMap<String, PermissionSet>,
}

impl AuthInterceptor {
    /// Build from the unprotected paths of all services
    ///
    /// An entry matches a method path it equals or is a prefix of, so a
    /// service-level entry like `/pkg.Service/` exempts every method. The
    /// built-in health and reflection paths are always added.
    pub fn new(tokens: TokenManager, unprotected: impl IntoIterator<Item = String>) -> Self {
        let mut unprotected: Vec<String> = unprotected
            .into_iter()
            .chain(std::iter::once(HEALTH_PREFIX.to_string()))
            .chain(REFLECTION_PREFIXES.iter().map(|p| p.to_string()))
            .filter(|p| !p.is_empty())
            .collect();
        unprotected.sort();
        unprotected.dedup();

        Self {
            tokens,
            unprotected,
            method_permissions: HashMap::new(),
        }
    }

    /// Require capabilities per method path
    ///
    /// ## Errors
    ///
    /// `ServerError::Config` naming the first unknown capability.
    pub fn with_method_permissions(
        mut self,
        permissions: &[MethodPermission],
    ) -> Result<Self, ServerError> {
        for entry in permissions {
            let required = PermissionSet::from_capabilities(&entry.capabilities).map_err(|e| {
                ServerError::Config(format!("method_permissions for {}: {e}", entry.method))
            })?;
            self.method_permissions.insert(entry.method.clone(), required);
        }
        Ok(self)
    }

    pub fn unprotected(&self) -> &[String] {
        &self.unprotected
    }

    pub fn is_unprotected(&self, method: &str) -> bool {
        self.unprotected.iter().any(|p| method.starts_with(p.as_str()))
    }

    fn authenticate(&self, token: Option<&AccessToken>) -> Result<AuthContext, Status> {
        let token = token.ok_or_else(|| Status::unauthenticated("missing access token"))?;

        match self.tokens.verify(token.as_str()) {
            Ok((principal, scopes)) => Ok(AuthContext { principal, scopes }),
            Err(TokenError::Expired) => Err(Status::unauthenticated("access token expired")),
            Err(e) => {
                debug!(error = %e, "access token rejected");
                Err(Status::unauthenticated("invalid access token"))
            }
        }
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("unprotected", &self.unprotected)
            .field("protected_methods", &self.method_permissions.len())
            .finish()
    }
}

impl Interceptor for AuthInterceptor {
    fn intercept(&self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let method = method_of(&request).to_string();
        let token = request.extensions().get::<AccessToken>();

        if self.is_unprotected(&method) {
            // Still identify the caller when it sent a usable token
            if let Ok(auth) = self.authenticate(token) {
                Span::current().record("user", auth.principal.username.as_str());
                request.extensions_mut().insert(auth);
            }
            return Ok(request);
        }

        let auth = self.authenticate(token)?;

        if let Some(required) = self.method_permissions.get(&method) {
            if !auth.permits(required) {
                debug!(
                    method = %method,
                    user = %auth.principal.username,
                    "no scope grants the required permissions"
                );
                return Err(Status::permission_denied(format!(
                    "insufficient permissions for {method}"
                )));
            }
        }

        Span::current().record("user", auth.principal.username.as_str());
        request.extensions_mut().insert(auth);
        Ok(request)
    }
}
