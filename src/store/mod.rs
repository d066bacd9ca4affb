/// Persistence boundary for the credential store.
///
/// All four entity kinds (accounts, issued tokens, activation codes, reset
/// tokens) are owned exclusively by an `AccountDirectory` implementation;
/// the orchestrator re-reads before mutating and never holds authoritative
/// copies across calls. Multi-step mutations (revoke-then-record,
/// activation, reset consumption) are single trait methods so each
/// implementation can make them atomic.

mod memory;
mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PgAccountDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::models::{Account, ActivationCode, IssuedToken, ResetToken, Role};
use crate::error::AppError;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    // -- accounts --
    async fn insert_account(&self, account: &Account) -> Result<(), AppError>;
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;
    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;
    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AppError>;
    async fn update_phone_number(&self, id: Uuid, phone: &str) -> Result<(), AppError>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), AppError>;

    // -- issued-token ledger --
    async fn insert_issued_token(&self, token: &IssuedToken) -> Result<(), AppError>;
    async fn find_issued_token(&self, token_hash: &str)
        -> Result<Option<IssuedToken>, AppError>;
    /// Marks every live entry for the account expired and revoked.
    /// A no-op when none exist.
    async fn revoke_live_tokens(&self, account_id: Uuid) -> Result<(), AppError>;
    /// Marks the single entry with this hash expired and revoked.
    /// A no-op when absent.
    async fn revoke_issued_token(&self, token_hash: &str) -> Result<(), AppError>;
    /// Revoke-then-record as one atomic unit, serialized per account, so
    /// two concurrent logins cannot leave a stale token alive.
    async fn revoke_and_record(&self, token: &IssuedToken) -> Result<(), AppError>;

    // -- activation codes --
    async fn insert_activation_code(&self, code: &ActivationCode) -> Result<(), AppError>;
    async fn find_activation_code(&self, code: &str)
        -> Result<Option<ActivationCode>, AppError>;
    /// Sets the expiry of every active code to `now`, keeping the rows as
    /// history.
    async fn expire_active_codes(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
    /// Enables the account and stamps the code's `validated_at` in one
    /// atomic unit.
    async fn complete_activation(
        &self,
        account_id: Uuid,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    // -- reset tokens --
    async fn insert_reset_token(&self, token: &ResetToken) -> Result<(), AppError>;
    async fn find_reset_token(&self, token: &str) -> Result<Option<ResetToken>, AppError>;
    /// Stores the new password hash and deletes the token in one atomic
    /// unit (single use).
    async fn consume_reset_token(
        &self,
        token: &str,
        account_id: Uuid,
        new_password_hash: &str,
    ) -> Result<(), AppError>;
}
