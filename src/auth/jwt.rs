/// Token codec: signed, tamper-evident session tokens.
///
/// Access and refresh tokens share the encoding (HS256, single
/// process-wide secret) and differ only in TTL. The codec decides
/// cryptographic validity; whether a token is currently authorized is the
/// ledger's call, never made here.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::auth::models::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

pub fn issue_token(
    email: &str,
    role: Role,
    ttl_seconds: i64,
    settings: &JwtSettings,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = Claims::new(email, role, ttl_seconds, &settings.issuer, now);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
}

pub fn issue_access_token(
    email: &str,
    role: Role,
    settings: &JwtSettings,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    issue_token(email, role, settings.access_token_expiry, settings, now)
}

pub fn issue_refresh_token(
    email: &str,
    role: Role,
    settings: &JwtSettings,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    issue_token(email, role, settings.refresh_token_expiry, settings, now)
}

fn validation(settings: &JwtSettings) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&settings.issuer]);
    validation.leeway = 0;
    validation
}

/// Decodes and verifies a token, keeping the failure kinds distinct:
/// callers prompt a re-login on `Expired` but treat `Malformed` and
/// `Unsupported` as hostile input.
pub fn decode_token(token: &str, settings: &JwtSettings) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(settings.secret.as_bytes());

    match decode::<Claims>(token, &key, &validation(settings)) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Err(TokenError::Expired {
                expired_at: recover_expiry(token, settings, &key),
            }),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Err(TokenError::Unsupported)
            }
            _ => Err(TokenError::Malformed),
        },
    }
}

/// The signature already verified; re-decode without the expiry check to
/// report the exact instant the token died.
fn recover_expiry(token: &str, settings: &JwtSettings, key: &DecodingKey) -> DateTime<Utc> {
    let mut relaxed = validation(settings);
    relaxed.validate_exp = false;

    decode::<Claims>(token, key, &relaxed)
        .ok()
        .and_then(|data| data.claims.expires_at())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "saraf-test".to_string(),
        }
    }

    #[test]
    fn issued_token_decodes_to_its_subject() {
        let settings = test_settings();
        let token =
            issue_access_token("jane@x.com", Role::User, &settings, Utc::now()).unwrap();
        let claims = decode_token(&token, &settings).unwrap();

        assert_eq!(claims.sub, "jane@x.com");
        assert_eq!(claims.role(), Some(Role::User));
        assert_eq!(claims.iss, "saraf-test");
    }

    #[test]
    fn tokens_issued_at_the_same_instant_are_distinct() {
        let settings = test_settings();
        let now = Utc::now();
        let first = issue_access_token("jane@x.com", Role::User, &settings, now).unwrap();
        let second = issue_access_token("jane@x.com", Role::User, &settings, now).unwrap();

        // Same subject, role and second-granularity timestamps must still
        // mint different token strings, or a same-second re-login would
        // collide in the ledger and defeat revocation.
        assert_ne!(first, second);
        assert_ne!(
            decode_token(&first, &settings).unwrap().jti,
            decode_token(&second, &settings).unwrap().jti
        );
    }

    #[test]
    fn access_and_refresh_differ_only_in_ttl() {
        let settings = test_settings();
        let now = Utc::now();
        let access = issue_access_token("a@x.com", Role::User, &settings, now).unwrap();
        let refresh = issue_refresh_token("a@x.com", Role::User, &settings, now).unwrap();

        let access_claims = decode_token(&access, &settings).unwrap();
        let refresh_claims = decode_token(&refresh, &settings).unwrap();
        assert_eq!(
            refresh_claims.exp - access_claims.exp,
            settings.refresh_token_expiry - settings.access_token_expiry
        );
    }

    #[test]
    fn expired_token_reports_expired_with_the_instant() {
        let settings = test_settings();
        let issued_at = Utc::now() - chrono::Duration::hours(2);
        let token = issue_token("jane@x.com", Role::User, 3600, &settings, issued_at).unwrap();

        match decode_token(&token, &settings) {
            Err(TokenError::Expired { expired_at }) => {
                assert_eq!(
                    expired_at.timestamp(),
                    (issued_at + chrono::Duration::seconds(3600)).timestamp()
                );
            }
            other => panic!("expected Expired, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let settings = test_settings();
        assert_eq!(
            decode_token("not.a.token", &settings),
            Err(TokenError::Malformed)
        );
        assert_eq!(decode_token("", &settings), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_signature_is_malformed() {
        let settings = test_settings();
        let token =
            issue_access_token("jane@x.com", Role::User, &settings, Utc::now()).unwrap();
        let tampered = format!("{}x", token);
        assert_eq!(
            decode_token(&tampered, &settings),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn wrong_algorithm_is_unsupported() {
        let settings = test_settings();
        let claims = Claims::new("jane@x.com", Role::User, 3600, &settings.issuer, Utc::now());
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(settings.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            decode_token(&token, &settings),
            Err(TokenError::Unsupported)
        );
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let mut other = test_settings();
        other.issuer = "someone-else".to_string();
        let token = issue_access_token("jane@x.com", Role::User, &other, Utc::now()).unwrap();

        assert!(decode_token(&token, &test_settings()).is_err());
    }
}
