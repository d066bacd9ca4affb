/// Authentication core: token codec, token ledger, activation codes,
/// password reset and the orchestrator tying them together.

pub mod claims;
pub mod jwt;
pub mod ledger;
pub mod models;
pub mod password;
pub mod reset;
pub mod service;
pub mod verification;

pub use claims::Claims;
pub use jwt::{decode_token, issue_access_token, issue_refresh_token, issue_token};
pub use ledger::TokenLedger;
pub use models::{Account, ActivationCode, AuthenticatedUser, IssuedToken, ResetToken, Role, TokenKind};
pub use password::{BcryptHasher, PasswordHasher};
pub use reset::PasswordResetManager;
pub use service::{AuthService, TokenPair};
pub use verification::VerificationCodeManager;
