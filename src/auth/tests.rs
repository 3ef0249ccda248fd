use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

fn set_env_vars() {
    unsafe {
        env::set_var("JWT_SECRET", "supersecretjwtsecretforunittesting123");
    }
}

#[test]
fn test_validate_jwt_success() {
    set_env_vars();
    let secret = "supersecretjwtsecretforunittesting123";
    let my_claims = Claims {
        sub: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        role: "Admin".to_string(),
        email: Some("admin@craftflow.dev".to_string()),
        exp: 9999999999, // far future
    };

    let token = encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    let claims = validate_jwt(&token).expect("Valid token should pass");
    assert_eq!(claims.sub, my_claims.sub);
    assert_eq!(claims.role, my_claims.role);
    assert_eq!(claims.email, my_claims.email);
}

#[test]
fn test_validate_jwt_expired() {
    set_env_vars();
    let secret = "supersecretjwtsecretforunittesting123";
    let my_claims = Claims {
        sub: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        role: "HR".to_string(),
        email: Some("hr@craftflow.dev".to_string()),
        exp: 1, // past
    };

    let token = encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    let result = validate_jwt(&token);
    assert!(result.is_err());
}

#[test]
fn test_validate_jwt_invalid_signature() {
    set_env_vars();
    let secret = "wrongsecret";
    let my_claims = Claims {
        sub: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        role: "Employee".to_string(),
        email: Some("emp@craftflow.dev".to_string()),
        exp: 9999999999,
    };

    let token = encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    let result = validate_jwt(&token);
    assert!(result.is_err());
}

#[test]
fn employee_reads_only_their_own_history() {
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("emp@craftflow.dev".to_string()),
        role: EmployeeRole::Employee,
    };
    assert!(user.can_view_history_for("emp@craftflow.dev"));
    assert!(!user.can_view_history_for("other@craftflow.dev"));

    let hr = AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("hr@craftflow.dev".to_string()),
        role: EmployeeRole::Hr,
    };
    assert!(hr.can_view_history_for("other@craftflow.dev"));
}
