//! Per-call state carried in request extensions
//!
//! The server pipeline fills these in as a call moves inward:
//! - [`CallContext`] by the context layer, before anything else runs
//! - [`UserAgent`] and [`AccessToken`] by the header interceptors
//! - [`AuthContext`] by the auth interceptor once the token verified
//! - [`TraceContext`] by the tracing interceptor
//!
//! Handlers read them back through [`AuthContextExt`].

use access_control::{is_sufficient, PermissionSet};
use std::time::Instant;
use token_manager::{Principal, Scopes};
use tonic::{Request, Status};

/// Identity of one inbound call
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Full method path, `/package.Service/Method`
    pub method: String,
    pub request_id: String,
    pub started_at: Instant,
}

impl CallContext {
    pub fn new(method: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            request_id: request_id.into(),
            started_at: Instant::now(),
        }
    }
}

/// Parsed `user-agent` of the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub raw: String,
    pub product: Option<String>,
    pub version: Option<String>,
}

impl UserAgent {
    /// `grpc-go/1.50.0 extra` → product `grpc-go`, version `1.50.0`
    pub fn parse(raw: &str) -> Self {
        let first = raw.split_whitespace().next().unwrap_or_default();
        let (product, version) = match first.split_once('/') {
            Some((product, version)) => (product, Some(version)),
            None => (first, None),
        };

        Self {
            raw: raw.to_string(),
            product: (!product.is_empty()).then(|| product.to_string()),
            version: version.filter(|v| !v.is_empty()).map(str::to_string),
        }
    }

    /// Whether the caller is a gRPC library rather than a gateway or browser
    pub fn is_grpc_client(&self) -> bool {
        self.product
            .as_deref()
            .is_some_and(|p| p.starts_with("grpc-") || p == "tonic")
    }
}

/// Raw bearer token found on the call
#[derive(Clone)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Verified principal and scopes of an authenticated call
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub scopes: Scopes,
}

impl AuthContext {
    /// Whether any scope's role covers `required`
    pub fn permits(&self, required: &PermissionSet) -> bool {
        self.scopes
            .values()
            .any(|scope| is_sufficient(Some(scope.role().permissions()), Some(required)))
    }
}

/// W3C trace context of the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex characters
    pub trace_id: String,
    /// Span id of the caller, when one was propagated
    pub parent_id: Option<String>,
    pub sampled: bool,
}

/// Accessors for the authenticated caller inside handlers
pub trait AuthContextExt {
    /// ## Errors
    ///
    /// `Status::unauthenticated` when the call carried no verified token.
    fn auth_context(&self) -> Result<&AuthContext, Status>;

    fn principal(&self) -> Result<&Principal, Status> {
        self.auth_context().map(|ctx| &ctx.principal)
    }

    /// Require that some scope of the caller covers `required`
    ///
    /// ## Errors
    ///
    /// `Status::unauthenticated` without a verified token,
    /// `Status::permission_denied` when no scope is sufficient.
    fn require_permissions(&self, required: &PermissionSet) -> Result<(), Status> {
        if self.auth_context()?.permits(required) {
            Ok(())
        } else {
            Err(Status::permission_denied("insufficient permissions"))
        }
    }

    fn call_context(&self) -> Option<&CallContext>;
}

impl<T> AuthContextExt for Request<T> {
    fn auth_context(&self) -> Result<&AuthContext, Status> {
        self.extensions()
            .get::<AuthContext>()
            .ok_or_else(|| Status::unauthenticated("call is not authenticated"))
    }

    fn call_context(&self) -> Option<&CallContext> {
        self.extensions().get::<CallContext>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_control::RoleName;
    use token_manager::{owner_scope, Scope};

    #[test]
    fn test_user_agent_parse() {
        let ua = UserAgent::parse("grpc-go/1.50.0 (linux)");
        assert_eq!(ua.product.as_deref(), Some("grpc-go"));
        assert_eq!(ua.version.as_deref(), Some("1.50.0"));
        assert!(ua.is_grpc_client());

        let ua = UserAgent::parse("curl");
        assert_eq!(ua.product.as_deref(), Some("curl"));
        assert_eq!(ua.version, None);
        assert!(!ua.is_grpc_client());

        assert_eq!(UserAgent::parse("").product, None);
    }

    #[test]
    fn test_permits() {
        let principal = Principal::new("https://idp.test", "u-1", "alice");
        let owner = AuthContext {
            principal: principal.clone(),
            scopes: owner_scope(),
        };
        let viewer_perms = *access_control::Role::new(RoleName::Viewer).permissions();
        assert!(owner.permits(&PermissionSet::ALL));

        let mut scopes = Scopes::new();
        scopes.insert("share:1".to_string(), Scope::new("share-1", RoleName::Viewer));
        let viewer = AuthContext { principal, scopes };
        assert!(viewer.permits(&viewer_perms));
        assert!(!viewer.permits(access_control::Role::new(RoleName::Editor).permissions()));
    }

    #[test]
    fn test_extension_trait() {
        let mut request = Request::new(());
        assert_eq!(
            request.principal().unwrap_err().code(),
            tonic::Code::Unauthenticated
        );

        request.extensions_mut().insert(AuthContext {
            principal: Principal::new("https://idp.test", "u-1", "alice"),
            scopes: Scopes::new(),
        });
        assert_eq!(request.principal().unwrap().username, "alice");
        assert_eq!(
            request
                .require_permissions(&PermissionSet::ALL)
                .unwrap_err()
                .code(),
            tonic::Code::PermissionDenied
        );
    }
}
