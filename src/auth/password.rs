/// Password hashing behind an injected collaborator trait, plus the
/// password-shape rule shared by registration, change and reset.

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

pub trait PasswordHasher: Send + Sync {
    fn encode(&self, plain: &str) -> Result<String, AppError>;
    fn matches(&self, plain: &str, hash: &str) -> Result<bool, AppError>;
}

/// bcrypt-backed hasher. Tests lower the cost to keep hashing cheap.
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptHasher {
    fn encode(&self, plain: &str) -> Result<String, AppError> {
        bcrypt::hash(plain, self.cost)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
    }

    fn matches(&self, plain: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(plain, hash)
            .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))
    }
}

/// Length bounds only: the lower bound is the security floor, the upper
/// bound caps bcrypt input.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHasher {
        BcryptHasher::with_cost(4)
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hasher().encode("longenough1").unwrap();
        assert_ne!(hash, "longenough1");
        assert!(hash.starts_with("$2"));
        assert!(hasher().matches("longenough1", &hash).unwrap());
        assert!(!hasher().matches("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn strength_check_is_length_bounded() {
        assert!(validate_password_strength("longenough1").is_ok());
        assert!(validate_password_strength("short").is_err());
        assert!(validate_password_strength(&"a".repeat(129)).is_err());
    }
}
