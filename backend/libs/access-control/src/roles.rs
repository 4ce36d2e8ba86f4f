//! Role catalog
//!
//! Roles are compiled in and never mutated. Lookup by name is exact and
//! case-sensitive; anything unknown resolves to the `none` role, which
//! carries no capability at all.

use crate::permissions::PermissionSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the roles known to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    Viewer,
    Editor,
    SpaceViewer,
    SpaceEditor,
    Uploader,
    Manager,
    Owner,
    Denied,
    None,
}

impl RoleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Viewer => "viewer",
            RoleName::Editor => "editor",
            RoleName::SpaceViewer => "spaceviewer",
            RoleName::SpaceEditor => "spaceeditor",
            RoleName::Uploader => "uploader",
            RoleName::Manager => "manager",
            RoleName::Owner => "owner",
            RoleName::Denied => "denied",
            RoleName::None => "none",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIEWER: PermissionSet = PermissionSet {
    stat: true,
    get_path: true,
    get_quota: true,
    initiate_file_download: true,
    list_grants: true,
    list_container: true,
    list_file_versions: true,
    list_recycle: true,
    ..PermissionSet::NONE
};

const EDITOR: PermissionSet = PermissionSet {
    create_container: true,
    delete: true,
    initiate_file_upload: true,
    move_: true,
    restore_file_version: true,
    restore_recycle_item: true,
    ..VIEWER
};

const SPACE_EDITOR: PermissionSet = PermissionSet {
    purge_recycle: true,
    ..EDITOR
};

const UPLOADER: PermissionSet = PermissionSet {
    stat: true,
    create_container: true,
    initiate_file_upload: true,
    list_container: true,
    ..PermissionSet::NONE
};

// A deny entry is itself a grant, so creating one needs the grant-management bits.
const DENIED: PermissionSet = PermissionSet {
    add_grant: true,
    remove_grant: true,
    update_grant: true,
    list_grants: true,
    deny_grant: true,
    ..PermissionSet::NONE
};

/// A named, immutable bundle of capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    name: RoleName,
    permissions: PermissionSet,
}

impl Role {
    pub const fn new(name: RoleName) -> Self {
        let permissions = match name {
            RoleName::Viewer | RoleName::SpaceViewer => VIEWER,
            RoleName::Editor => EDITOR,
            RoleName::SpaceEditor => SPACE_EDITOR,
            RoleName::Uploader => UPLOADER,
            RoleName::Manager | RoleName::Owner => PermissionSet::ALL,
            RoleName::Denied => DENIED,
            RoleName::None => PermissionSet::NONE,
        };
        Self { name, permissions }
    }

    /// Resolve a role by its exact name
    ///
    /// With `disambiguate_space`, names shared between resource and space
    /// roles (`viewer`, `editor`) resolve to the space-scoped variant.
    /// Unknown names fail closed to the `none` role.
    pub fn from_name(name: &str, disambiguate_space: bool) -> Role {
        let role = match name {
            "viewer" if disambiguate_space => RoleName::SpaceViewer,
            "editor" if disambiguate_space => RoleName::SpaceEditor,
            "viewer" => RoleName::Viewer,
            "editor" => RoleName::Editor,
            "spaceviewer" => RoleName::SpaceViewer,
            "spaceeditor" => RoleName::SpaceEditor,
            "uploader" => RoleName::Uploader,
            "manager" => RoleName::Manager,
            "owner" => RoleName::Owner,
            "denied" => RoleName::Denied,
            _ => RoleName::None,
        };
        Role::new(role)
    }

    pub fn name(&self) -> RoleName {
        self.name
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

impl From<RoleName> for Role {
    fn from(name: RoleName) -> Self {
        Role::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(Role::from_name("editor", false).name(), RoleName::Editor);
        assert_eq!(Role::from_name("Editor", false).name(), RoleName::None);
        assert_eq!(Role::from_name(" editor", false).name(), RoleName::None);
    }

    #[test]
    fn test_space_disambiguation() {
        assert_eq!(Role::from_name("viewer", true).name(), RoleName::SpaceViewer);
        assert_eq!(Role::from_name("editor", true).name(), RoleName::SpaceEditor);
        assert_eq!(Role::from_name("manager", true).name(), RoleName::Manager);
        assert_eq!(Role::from_name("spaceeditor", false).name(), RoleName::SpaceEditor);
    }

    #[test]
    fn test_unknown_role_fails_closed() {
        let role = Role::from_name("superuser", false);
        assert_eq!(role.name(), RoleName::None);
        assert!(role.permissions().is_empty());
    }

    #[test]
    fn test_role_name_serde() {
        assert_eq!(RoleName::SpaceEditor.to_string(), "spaceeditor");
        let name: RoleName = serde_json::from_str("\"spaceviewer\"").unwrap();
        assert_eq!(name, RoleName::SpaceViewer);
    }
}
