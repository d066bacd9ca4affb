/// Token ledger: the persisted record of every issued token, and the
/// source of truth for revocation beyond what the codec can express.
///
/// Only SHA-256 hashes of token strings are stored. A token can be
/// cryptographically unexpired yet unusable here because a later login
/// revoked it.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::models::{IssuedToken, TokenKind};
use crate::clock::Clock;
use crate::error::AppError;
use crate::store::AccountDirectory;

/// Never store plaintext tokens at rest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct TokenLedger {
    directory: Arc<dyn AccountDirectory>,
    clock: Arc<dyn Clock>,
}

impl TokenLedger {
    pub fn new(directory: Arc<dyn AccountDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self { directory, clock }
    }

    fn entry(&self, account_id: Uuid, token: &str, kind: TokenKind) -> IssuedToken {
        IssuedToken {
            token_hash: hash_token(token),
            account_id,
            kind,
            expired: false,
            revoked: false,
            created_at: self.clock.now(),
        }
    }

    pub async fn record(
        &self,
        account_id: Uuid,
        token: &str,
        kind: TokenKind,
    ) -> Result<(), AppError> {
        self.directory
            .insert_issued_token(&self.entry(account_id, token, kind))
            .await
    }

    /// True iff an entry exists for this exact token string and neither
    /// flag is set. Embedded expiry is the codec's concern.
    pub async fn is_usable(&self, token: &str) -> Result<bool, AppError> {
        let entry = self.directory.find_issued_token(&hash_token(token)).await?;
        Ok(entry.map(|e| e.is_usable()).unwrap_or(false))
    }

    /// Marks every live entry for the account expired and revoked; a
    /// no-op when the account has none.
    pub async fn revoke_all(&self, account_id: Uuid) -> Result<(), AppError> {
        self.directory.revoke_live_tokens(account_id).await
    }

    /// Revokes exactly this token, leaving the account's other entries
    /// untouched. Unknown tokens are a no-op, so logout is idempotent.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.directory.revoke_issued_token(&hash_token(token)).await
    }

    /// The single-active-session sweep: earlier tokens are invalidated
    /// even though their own expiry has not elapsed, atomically with
    /// recording the replacement.
    pub async fn revoke_and_record(
        &self,
        account_id: Uuid,
        token: &str,
        kind: TokenKind,
    ) -> Result<(), AppError> {
        self.directory
            .revoke_and_record(&self.entry(account_id, token, kind))
            .await
    }
}
