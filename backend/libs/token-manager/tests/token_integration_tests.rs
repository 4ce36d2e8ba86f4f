/// Integration tests for token minting and verification
///
/// Covers:
/// - mint/verify round trip for arbitrary principals and scopes
/// - tampering detection
/// - expiry enforcement (TTL and weekend policy)
use access_control::RoleName;
use chrono::{Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use token_manager::{
    owner_scope, Principal, Scope, Scopes, TokenConfig, TokenError, TokenManager, UserType,
};

const SECRET: &str = "J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W";

fn manager() -> TokenManager {
    TokenManager::new(TokenConfig::with_secret(SECRET)).expect("valid config")
}

fn principal(name: &str) -> Principal {
    let mut p = Principal::new("https://cloud.example.org", uuid::Uuid::new_v4().to_string(), name);
    p.mail = format!("{name}@example.org");
    p.display_name = name.to_uppercase();
    p.groups = vec!["staff".to_string()];
    p
}

/// Flip one character inside the payload segment
fn flip_payload_byte(token: &str) -> String {
    let payload_start = token.find('.').expect("jwt has a payload") + 1;
    let index = payload_start + 5;
    let mut bytes = token.as_bytes().to_vec();
    bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).expect("ascii token")
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_round_trip_preserves_principal_and_scopes() {
    let manager = manager();

    for (i, name) in ["alice", "bob", "carol"].iter().enumerate() {
        let mut user = principal(name);
        if i == 1 {
            user.id.user_type = UserType::Federated;
        }

        let mut scopes: Scopes = owner_scope();
        scopes.insert(
            format!("share:{i}"),
            Scope::new(format!("storage$space!{i}"), RoleName::Editor),
        );

        let token = manager.mint(&user, &scopes).expect("mint");
        let (verified_user, verified_scopes) = manager.verify(&token).expect("verify");

        assert_eq!(verified_user, user);
        assert_eq!(verified_scopes, scopes);
    }
}

#[test]
fn test_empty_scopes_round_trip() {
    let token = manager().mint(&principal("dave"), &Scopes::new()).unwrap();
    let (_, scopes) = manager().verify(&token).unwrap();
    assert!(scopes.is_empty());
}

#[test]
fn test_manager_is_shareable_across_threads() {
    let manager = manager();
    let token = manager.mint(&principal("erin"), &owner_scope()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let token = token.clone();
            std::thread::spawn(move || manager.verify(&token).is_ok())
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

// ============================================================================
// Tampering
// ============================================================================

#[test]
fn test_flipping_one_byte_fails_verification() {
    let token = manager().mint(&principal("alice"), &owner_scope()).unwrap();
    let tampered = flip_payload_byte(&token);

    assert_ne!(tampered, token);
    assert!(matches!(
        manager().verify(&tampered),
        Err(TokenError::InvalidCredentials(_))
    ));
}

#[test]
fn test_garbage_is_invalid() {
    for garbage in ["", "invalid.token.here", "a.b", "..."] {
        assert!(matches!(
            manager().verify(garbage),
            Err(TokenError::InvalidCredentials(_))
        ));
    }
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_short_ttl_token_expires() {
    let config = TokenConfig {
        expires_secs: 60,
        ..TokenConfig::with_secret(SECRET)
    };
    let manager = TokenManager::new(config).unwrap();

    let fresh = manager.mint(&principal("alice"), &owner_scope()).unwrap();
    assert!(manager.verify(&fresh).is_ok());

    let stale = manager
        .mint_at(&principal("alice"), &owner_scope(), Utc::now() - Duration::seconds(120))
        .unwrap();
    assert!(matches!(manager.verify(&stale), Err(TokenError::Expired)));
}

#[test]
fn test_weekend_policy_sets_sunday_expiry() {
    let config = TokenConfig {
        expires_next_weekend: true,
        ..TokenConfig::with_secret(SECRET)
    };
    let manager = TokenManager::new(config).unwrap();

    // 2031-03-05 is a Wednesday
    let wednesday = Utc.with_ymd_and_hms(2031, 3, 5, 12, 0, 0).unwrap();
    let expiry = manager.expires_at(wednesday).unwrap();
    assert_eq!(expiry.weekday(), Weekday::Sun);
    assert_eq!(expiry.date_naive().day(), 9);
    assert_eq!((expiry.hour(), expiry.minute(), expiry.second()), (23, 59, 59));

    // 2031-03-09 is a Sunday: next weekend is a week later
    let sunday = Utc.with_ymd_and_hms(2031, 3, 9, 8, 0, 0).unwrap();
    assert_eq!(manager.expires_at(sunday).unwrap().date_naive().day(), 16);

    let token = manager.mint(&principal("alice"), &owner_scope()).unwrap();
    assert!(manager.verify(&token).is_ok());
}
