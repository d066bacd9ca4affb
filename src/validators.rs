/// Input validation for the auth boundary: email, person names and phone
/// numbers. Length limits come first so oversized input is rejected before
/// any regex work.

use crate::error::ValidationError;
use lazy_static::lazy_static;
use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // Optional leading +, then 10-15 digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{10,15}$").unwrap();
}

pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".into(),
        ));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_name(name: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_NAME_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(format!(
            "{} contains control characters",
            field
        )));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_phone_number(phone: &str) -> Result<String, ValidationError> {
    let trimmed = phone.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("phone number"));
    }
    if !PHONE_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "invalid phone number format".into(),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        for email in ["jane@x.com", "user.name+tag@example.co.uk", " padded@example.com "] {
            assert!(is_valid_email(email).is_ok(), "should accept {}", email);
        }
    }

    #[test]
    fn rejects_broken_emails() {
        for email in ["", "notanemail", "user@", "@example.com", "user@@example.com"] {
            assert!(is_valid_email(email).is_err(), "should reject {:?}", email);
        }
    }

    #[test]
    fn email_is_trimmed() {
        assert_eq!(is_valid_email(" jane@x.com ").unwrap(), "jane@x.com");
    }

    #[test]
    fn rejects_oversized_email() {
        let local = "a".repeat(250);
        assert!(is_valid_email(&format!("{}@x.com", local)).is_err());
    }

    #[test]
    fn names_reject_empty_and_control_chars() {
        assert!(is_valid_name("Jane", "firstname").is_ok());
        assert!(is_valid_name("  ", "firstname").is_err());
        assert!(is_valid_name("Ja\x07ne", "firstname").is_err());
    }

    #[test]
    fn phone_numbers_match_the_pattern() {
        assert!(is_valid_phone_number("+21355512345").is_ok());
        assert!(is_valid_phone_number("0555123456").is_ok());
        assert!(is_valid_phone_number("12345").is_err());
        assert!(is_valid_phone_number("call-me").is_err());
    }
}
