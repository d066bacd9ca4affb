/// In-memory `AccountDirectory` used by the test suites and local demos.
/// A single mutex over the whole state serializes every multi-step
/// mutation, which trivially satisfies the atomicity the trait requires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::auth::models::{Account, ActivationCode, IssuedToken, ResetToken, Role};
use crate::error::{AppError, AuthError};
use crate::store::AccountDirectory;

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    tokens: HashMap<String, IssuedToken>,
    codes: Vec<ActivationCode>,
    resets: HashMap<String, ResetToken>,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Store("directory mutex poisoned".to_string()))
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(AppError::Auth(AuthError::DuplicateEmail));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let state = self.lock()?;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let state = self.lock()?;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let state = self.lock()?;
        Ok(state.accounts.values().any(|a| a.email == email))
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AppError> {
        let mut state = self.lock()?;
        match state.accounts.get_mut(&id) {
            Some(account) => {
                account.password_hash = hash.to_string();
                Ok(())
            }
            None => Err(AppError::Auth(AuthError::AccountNotFound)),
        }
    }

    async fn update_phone_number(&self, id: Uuid, phone: &str) -> Result<(), AppError> {
        let mut state = self.lock()?;
        match state.accounts.get_mut(&id) {
            Some(account) => {
                account.phone_number = Some(phone.to_string());
                Ok(())
            }
            None => Err(AppError::Auth(AuthError::AccountNotFound)),
        }
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), AppError> {
        let mut state = self.lock()?;
        match state.accounts.get_mut(&id) {
            Some(account) => {
                account.role = role;
                Ok(())
            }
            None => Err(AppError::Auth(AuthError::AccountNotFound)),
        }
    }

    async fn insert_issued_token(&self, token: &IssuedToken) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_issued_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<IssuedToken>, AppError> {
        let state = self.lock()?;
        Ok(state.tokens.get(token_hash).cloned())
    }

    async fn revoke_live_tokens(&self, account_id: Uuid) -> Result<(), AppError> {
        let mut state = self.lock()?;
        for token in state.tokens.values_mut() {
            if token.account_id == account_id && token.is_usable() {
                token.expired = true;
                token.revoked = true;
            }
        }
        Ok(())
    }

    async fn revoke_issued_token(&self, token_hash: &str) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if let Some(token) = state.tokens.get_mut(token_hash) {
            token.expired = true;
            token.revoked = true;
        }
        Ok(())
    }

    async fn revoke_and_record(&self, token: &IssuedToken) -> Result<(), AppError> {
        // One guard across both steps: nothing can interleave.
        let mut state = self.lock()?;
        for existing in state.tokens.values_mut() {
            if existing.account_id == token.account_id && existing.is_usable() {
                existing.expired = true;
                existing.revoked = true;
            }
        }
        state.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn insert_activation_code(&self, code: &ActivationCode) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.codes.push(code.clone());
        Ok(())
    }

    async fn find_activation_code(
        &self,
        code: &str,
    ) -> Result<Option<ActivationCode>, AppError> {
        let state = self.lock()?;
        Ok(state
            .codes
            .iter()
            .filter(|c| c.code == code)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn expire_active_codes(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        for code in state.codes.iter_mut() {
            if code.account_id == account_id && code.is_active(now) {
                code.expires_at = now;
            }
        }
        Ok(())
    }

    async fn complete_activation(
        &self,
        account_id: Uuid,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        match state.accounts.get_mut(&account_id) {
            Some(account) => account.enabled = true,
            None => return Err(AppError::Auth(AuthError::AccountNotFound)),
        }
        for entry in state.codes.iter_mut() {
            if entry.code == code && entry.account_id == account_id {
                entry.validated_at = Some(at);
            }
        }
        Ok(())
    }

    async fn insert_reset_token(&self, token: &ResetToken) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.resets.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<ResetToken>, AppError> {
        let state = self.lock()?;
        Ok(state.resets.get(token).cloned())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        account_id: Uuid,
        new_password_hash: &str,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        match state.accounts.get_mut(&account_id) {
            Some(account) => account.password_hash = new_password_hash.to_string(),
            None => return Err(AppError::Auth(AuthError::AccountNotFound)),
        }
        state.resets.remove(token);
        Ok(())
    }
}
