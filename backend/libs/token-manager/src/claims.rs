//! Principal and scope types carried inside access tokens

use access_control::{Role, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of account behind a principal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Primary,
    Secondary,
    Service,
    Guest,
    Federated,
    Lightweight,
    SpaceOwner,
}

/// Globally unique user identity: the home identity provider plus an opaque id
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    /// Home authority of the user; becomes the token issuer
    pub idp: String,
    pub opaque_id: String,
    #[serde(default, rename = "type")]
    pub user_type: UserType,
}

/// Authenticated principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(idp: impl Into<String>, opaque_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: UserId {
                idp: idp.into(),
                opaque_id: opaque_id.into(),
                user_type: UserType::Primary,
            },
            username: username.into(),
            ..Default::default()
        }
    }
}

/// Name of the scope that grants the principal full access to its own resources
pub const USER_SCOPE: &str = "user";

/// A resource-bounded grant embedded in a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Opaque reference to the resource the scope is bound to
    pub resource: String,
    /// Minimum role the bearer holds on `resource`
    pub role: RoleName,
    /// How `resource` is encoded, when it is not a plain path or id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder: Option<String>,
}

impl Scope {
    pub fn new(resource: impl Into<String>, role: RoleName) -> Self {
        Self {
            resource: resource.into(),
            role,
            decoder: None,
        }
    }

    pub fn with_decoder(mut self, decoder: impl Into<String>) -> Self {
        self.decoder = Some(decoder.into());
        self
    }

    pub fn role(&self) -> Role {
        Role::new(self.role)
    }
}

/// Scope name → scope
pub type Scopes = BTreeMap<String, Scope>;

/// Full-access scope for a principal's own namespace
pub fn owner_scope() -> Scopes {
    let mut scopes = Scopes::new();
    scopes.insert(USER_SCOPE.to_string(), Scope::new("/", RoleName::Owner));
    scopes
}

/// Registered claims plus the principal and its scopes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub user: Principal,
    #[serde(default)]
    pub scope: Scopes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trips_through_json() {
        let scope = Scope::new("storage-1$space-2!node-3", RoleName::Editor).with_decoder("resource-id");
        let json = serde_json::to_string(&scope).unwrap();
        assert!(json.contains("\"role\":\"editor\""));
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }

    #[test]
    fn test_user_ids_are_hashable() {
        use std::collections::HashSet;

        let alice = Principal::new("https://idp.test", "u-1", "alice");
        let mut service = alice.id.clone();
        service.user_type = UserType::Service;

        let ids: HashSet<UserId> = [alice.id.clone(), alice.id.clone(), service].into_iter().collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_owner_scope() {
        let scopes = owner_scope();
        assert_eq!(scopes[USER_SCOPE].role, RoleName::Owner);
    }
}
