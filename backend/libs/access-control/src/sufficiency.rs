//! Permission sufficiency
//!
//! `is_sufficient` is the single authorization primitive shared by the auth
//! interceptor and by services deciding on grants: the held set must carry
//! every capability the requested set carries.

use crate::permissions::PermissionSet;

/// Whether `existing` structurally dominates `requested`
///
/// An unset side is never sufficient, including when both sides are unset.
pub fn is_sufficient(existing: Option<&PermissionSet>, requested: Option<&PermissionSet>) -> bool {
    let (Some(existing), Some(requested)) = (existing, requested) else {
        return false;
    };

    existing
        .flags()
        .into_iter()
        .zip(requested.flags())
        .all(|(held, wanted)| held || !wanted)
}
