/// Sufficiency properties across the role catalog
use access_control::{is_sufficient, PermissionSet, Role, RoleName};

const ALL_ROLES: &[RoleName] = &[
    RoleName::Viewer,
    RoleName::Editor,
    RoleName::SpaceViewer,
    RoleName::SpaceEditor,
    RoleName::Uploader,
    RoleName::Manager,
    RoleName::Owner,
    RoleName::Denied,
    RoleName::None,
];

fn sufficient(held: RoleName, wanted: RoleName) -> bool {
    is_sufficient(
        Some(Role::new(held).permissions()),
        Some(Role::new(wanted).permissions()),
    )
}

/// Reference definition: every flag set in `wanted` is set in `held`
fn field_wise_subset(held: &PermissionSet, wanted: &PermissionSet) -> bool {
    PermissionSet::CAPABILITIES
        .iter()
        .enumerate()
        .all(|(i, _)| !wanted.flags()[i] || held.flags()[i])
}

#[test]
fn test_nil_existing_never_sufficient() {
    assert!(!is_sufficient(None, None));
    for role in ALL_ROLES {
        assert!(!is_sufficient(None, Some(Role::new(*role).permissions())));
    }
}

#[test]
fn test_nil_requested_never_sufficient() {
    for role in ALL_ROLES {
        assert!(!is_sufficient(Some(Role::new(*role).permissions()), None));
    }
}

#[test]
fn test_reflexive() {
    for role in ALL_ROLES {
        assert!(sufficient(*role, *role), "{role} should satisfy itself");
    }
}

#[test]
fn test_matches_field_wise_subset_for_all_pairs() {
    for held in ALL_ROLES {
        for wanted in ALL_ROLES {
            let expected = field_wise_subset(Role::new(*held).permissions(), Role::new(*wanted).permissions());
            assert_eq!(sufficient(*held, *wanted), expected, "held={held} wanted={wanted}");
        }
    }
}

#[test]
fn test_role_hierarchy() {
    // manager ⊇ spaceeditor ⊇ spaceviewer
    assert!(sufficient(RoleName::Manager, RoleName::SpaceEditor));
    assert!(sufficient(RoleName::SpaceEditor, RoleName::SpaceViewer));
    assert!(sufficient(RoleName::Manager, RoleName::SpaceViewer));

    // manager ⊇ editor ⊇ viewer
    assert!(sufficient(RoleName::Manager, RoleName::Editor));
    assert!(sufficient(RoleName::Editor, RoleName::Viewer));
    assert!(sufficient(RoleName::Manager, RoleName::Viewer));
}

#[test]
fn test_editor_viewer() {
    assert!(sufficient(RoleName::Editor, RoleName::Viewer));
    assert!(!sufficient(RoleName::Viewer, RoleName::Editor));
}

#[test]
fn test_denied_requires_grant_management() {
    assert!(sufficient(RoleName::Manager, RoleName::Denied));
    assert!(sufficient(RoleName::Owner, RoleName::Denied));
    assert!(!sufficient(RoleName::Editor, RoleName::Denied));
    assert!(!sufficient(RoleName::SpaceEditor, RoleName::Denied));
    assert!(!sufficient(RoleName::Viewer, RoleName::Denied));
}

#[test]
fn test_unknown_role_grants_nothing() {
    let unknown = Role::from_name("admin", false);
    assert!(!is_sufficient(
        Some(unknown.permissions()),
        Some(Role::new(RoleName::Viewer).permissions())
    ));
}

#[test]
fn test_custom_sets() {
    let held = PermissionSet::from_capabilities(["stat", "list_container", "initiate_file_download"]).unwrap();
    let wanted = PermissionSet::from_capabilities(["stat", "list_container"]).unwrap();
    assert!(is_sufficient(Some(&held), Some(&wanted)));
    assert!(!is_sufficient(Some(&wanted), Some(&held)));
}
