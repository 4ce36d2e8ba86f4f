//! Resource permission sets
//!
//! A `PermissionSet` is a fixed record of boolean capabilities on a resource.
//! The field list is declared once through `permission_set!` so that every
//! operation that walks the fields (sufficiency, parsing, listing) sees the
//! same set in the same order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a capability name is not part of the fixed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

macro_rules! permission_set {
    ($($field:ident => $name:literal),+ $(,)?) => {
        /// Boolean capabilities held on (or requested for) a resource
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(default)]
        pub struct PermissionSet {
            $(
                #[serde(rename = $name)]
                pub $field: bool,
            )+
        }

        /// Number of capabilities in a `PermissionSet`
        pub const CAPABILITY_COUNT: usize = [$($name),+].len();

        impl PermissionSet {
            /// Wire names of every capability, in declaration order
            pub const CAPABILITIES: &'static [&'static str] = &[$($name),+];

            /// No capability set
            pub const NONE: PermissionSet = PermissionSet { $($field: false,)+ };

            /// Every capability set
            pub const ALL: PermissionSet = PermissionSet { $($field: true,)+ };

            /// Flags in declaration order, paired with `CAPABILITIES`
            pub fn flags(&self) -> [bool; CAPABILITY_COUNT] {
                [$(self.$field),+]
            }

            /// Set a capability by wire name
            pub fn grant(&mut self, capability: &str) -> Result<(), UnknownCapability> {
                match capability {
                    $($name => self.$field = true,)+
                    other => return Err(UnknownCapability(other.to_string())),
                }
                Ok(())
            }
        }
    };
}

permission_set! {
    add_grant => "add_grant",
    create_container => "create_container",
    delete => "delete",
    get_path => "get_path",
    get_quota => "get_quota",
    initiate_file_download => "initiate_file_download",
    initiate_file_upload => "initiate_file_upload",
    list_container => "list_container",
    list_file_versions => "list_file_versions",
    list_grants => "list_grants",
    list_recycle => "list_recycle",
    move_ => "move",
    purge_recycle => "purge_recycle",
    remove_grant => "remove_grant",
    restore_file_version => "restore_file_version",
    restore_recycle_item => "restore_recycle_item",
    stat => "stat",
    update_grant => "update_grant",
    deny_grant => "deny_grant",
}

impl PermissionSet {
    /// Build a set from capability wire names
    ///
    /// Used by configuration blocks that describe what a method requires.
    pub fn from_capabilities<I, S>(capabilities: I) -> Result<Self, UnknownCapability>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PermissionSet::NONE;
        for capability in capabilities {
            set.grant(capability.as_ref())?;
        }
        Ok(set)
    }

    /// Names of the capabilities that are set
    pub fn granted(&self) -> Vec<&'static str> {
        Self::CAPABILITIES
            .iter()
            .zip(self.flags())
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.flags().into_iter().any(|f| f)
    }
}
