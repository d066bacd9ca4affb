/// Error types for the authentication core.
///
/// Each subsystem has its own error enum so callers can react to the exact
/// failure (an expired bearer token is handled very differently from an
/// expired activation code). The unified `AppError` is what crosses the
/// service boundary; the `ResponseError` impl at the bottom is the only
/// place that decides transport status codes.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt;

/// Account and credential failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    DuplicateEmail,
    InvalidCredentials,
    AccountDisabled,
    AccountNotFound,
    Forbidden,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::DuplicateEmail => write!(f, "email already registered"),
            AuthError::InvalidCredentials => write!(f, "invalid email or password"),
            AuthError::AccountDisabled => write!(f, "email not verified"),
            AuthError::AccountNotFound => write!(f, "account not found"),
            AuthError::Forbidden => write!(f, "insufficient privileges"),
        }
    }
}

impl StdError for AuthError {}

/// Bearer-token decode and validation failures.
///
/// `Malformed`, `Unsupported` and `Expired` are deliberately distinct:
/// expired tokens prompt a re-login while malformed ones are treated as
/// hostile input. `Invalid` covers tokens that decode fine but are not
/// currently authorized (revoked in the ledger, unknown subject, missing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Unsupported,
    Expired { expired_at: DateTime<Utc> },
    Invalid,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::Unsupported => write!(f, "unsupported token"),
            TokenError::Expired { expired_at } => {
                write!(f, "token expired at {}", expired_at.to_rfc3339())
            }
            TokenError::Invalid => write!(f, "invalid or missing token"),
        }
    }
}

impl StdError for TokenError {}

/// Account-activation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    CodeEmpty,
    CodeInvalid,
    CodeExpired,
    CodeAlreadyUsed,
    AccountAlreadyActivated,
    AccountAlreadyVerified,
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::CodeEmpty => write!(f, "code can not be empty"),
            ActivationError::CodeInvalid => write!(f, "invalid code, please try again"),
            ActivationError::CodeExpired => {
                write!(f, "code has expired, request a new one to continue")
            }
            ActivationError::CodeAlreadyUsed => write!(f, "code has already been used"),
            ActivationError::AccountAlreadyActivated => {
                write!(f, "account is already activated, please head to the login page")
            }
            ActivationError::AccountAlreadyVerified => write!(f, "email is already verified"),
        }
    }
}

impl StdError for ActivationError {}

/// Password-reset failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    TokenInvalid,
    TokenExpired,
    PasswordMismatch,
}

impl fmt::Display for ResetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetError::TokenInvalid => write!(f, "invalid reset request, please make a new one"),
            ResetError::TokenExpired => write!(f, "reset request expired, please make a new one"),
            ResetError::PasswordMismatch => write!(f, "passwords do not match"),
        }
    }
}

impl StdError for ResetError {}

/// Input validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Central error type the orchestrator and request gate surface to the
/// HTTP boundary.
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Token(TokenError),
    Activation(ActivationError),
    Reset(ResetError),
    Validation(ValidationError),
    Store(String),
    Email(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Activation(e) => write!(f, "{}", e),
            AppError::Reset(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Store(msg) => write!(f, "store error: {}", msg),
            AppError::Email(msg) => write!(f, "email error: {}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<ActivationError> for AppError {
    fn from(err: ActivationError) -> Self {
        AppError::Activation(err)
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        AppError::Reset(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Only a violation of the accounts email uniqueness constraint is
        // a duplicate registration; any other database failure is a plain
        // store error.
        match &err {
            sqlx::Error::Database(db) if db.constraint() == Some("accounts_email_key") => {
                AppError::Auth(AuthError::DuplicateEmail)
            }
            _ => AppError::Store(err.to_string()),
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
}

impl AppError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(AuthError::DuplicateEmail) => "DUPLICATE_EMAIL",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::AccountDisabled) => "ACCOUNT_DISABLED",
            AppError::Auth(AuthError::AccountNotFound) => "ACCOUNT_NOT_FOUND",
            AppError::Auth(AuthError::Forbidden) => "FORBIDDEN",
            AppError::Token(TokenError::Expired { .. }) => "TOKEN_EXPIRED",
            AppError::Token(_) => "TOKEN_INVALID",
            AppError::Activation(ActivationError::CodeEmpty) => "CODE_EMPTY",
            AppError::Activation(ActivationError::CodeInvalid) => "CODE_INVALID",
            AppError::Activation(ActivationError::CodeExpired) => "CODE_EXPIRED",
            AppError::Activation(ActivationError::CodeAlreadyUsed) => "CODE_ALREADY_USED",
            AppError::Activation(ActivationError::AccountAlreadyActivated) => {
                "ACCOUNT_ALREADY_ACTIVATED"
            }
            AppError::Activation(ActivationError::AccountAlreadyVerified) => {
                "ACCOUNT_ALREADY_VERIFIED"
            }
            AppError::Reset(ResetError::TokenInvalid) => "RESET_TOKEN_INVALID",
            AppError::Reset(ResetError::TokenExpired) => "RESET_TOKEN_EXPIRED",
            AppError::Reset(ResetError::PasswordMismatch) => "PASSWORD_MISMATCH",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Email(_) => "EMAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Store(msg) => tracing::error!(error = %msg, "store failure"),
            AppError::Email(msg) => tracing::error!(error = %msg, "email dispatch failure"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "internal error"),
            AppError::Token(e) => tracing::warn!(error = %e, "token rejected"),
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!("invalid credentials attempt")
            }
            other => tracing::warn!(error = %other, "request rejected"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::DuplicateEmail) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::AccountNotFound) => StatusCode::NOT_FOUND,
            AppError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Activation(_) => StatusCode::BAD_REQUEST,
            AppError::Reset(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Email(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
            code: self.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err = AppError::Auth(AuthError::DuplicateEmail);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "DUPLICATE_EMAIL");
    }

    #[test]
    fn disabled_account_is_unauthorized_not_bad_request() {
        let err = AppError::Auth(AuthError::AccountDisabled);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn token_errors_are_unauthorized() {
        for e in [
            TokenError::Malformed,
            TokenError::Unsupported,
            TokenError::Expired { expired_at: Utc::now() },
            TokenError::Invalid,
        ] {
            assert_eq!(AppError::Token(e).status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn expired_token_message_names_the_instant() {
        let at = Utc::now();
        let err = TokenError::Expired { expired_at: at };
        assert!(err.to_string().contains(&at.to_rfc3339()));
    }

    #[test]
    fn sqlx_errors_without_the_email_constraint_stay_store_errors() {
        // A token-ledger key collision (or any other duplicate) must not
        // surface as a duplicate-email conflict.
        let err: AppError =
            sqlx::Error::Protocol("duplicate key value violates unique constraint".into()).into();
        match err {
            AppError::Store(_) => (),
            other => panic!("expected Store, got {:?}", other),
        }
    }

    #[test]
    fn activation_errors_are_bad_requests() {
        let err = AppError::Activation(ActivationError::CodeAlreadyUsed);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "CODE_ALREADY_USED");
    }
}
