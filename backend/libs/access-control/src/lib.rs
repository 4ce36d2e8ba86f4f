//! Access control primitives for the federation backend
//!
//! - **PermissionSet**: fixed record of resource capabilities
//! - **Role**: compiled-in named bundles of capabilities
//! - **is_sufficient**: field-wise dominance check between two sets
//!
//! ## Usage
//!
//! ```rust
//! use access_control::{is_sufficient, Role};
//!
//! let held = Role::from_name("editor", false);
//! let wanted = Role::from_name("viewer", false);
//! assert!(is_sufficient(Some(held.permissions()), Some(wanted.permissions())));
//! ```

pub mod permissions;
pub mod roles;
pub mod sufficiency;

pub use permissions::{PermissionSet, UnknownCapability, CAPABILITY_COUNT};
pub use roles::{Role, RoleName};
pub use sufficiency::is_sufficient;
