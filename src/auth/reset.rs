/// Password reset manager: single-use reset tokens, plus the
/// change-password path for already-authenticated users.

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::{validate_password_strength, PasswordHasher};
use crate::clock::Clock;
use crate::email_client::{Notification, NotificationDispatcher, NotificationKind};
use crate::error::{AppError, AuthError, ResetError};
use crate::store::AccountDirectory;

pub const RESET_TTL_MINUTES: i64 = 15;

pub struct PasswordResetManager {
    directory: Arc<dyn AccountDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl PasswordResetManager {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            hasher,
            dispatcher,
            clock,
        }
    }

    /// Mints a random unguessable token, persists it with the standard
    /// TTL and requests a reset-link notification. The token must be
    /// infeasible to brute-force within its window, so it is a UUIDv4,
    /// not a numeric code.
    pub async fn request(&self, email: &str) -> Result<(), AppError> {
        let account = self
            .directory
            .find_account_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let token = crate::auth::models::ResetToken {
            token: Uuid::new_v4().to_string(),
            account_id: account.id,
            expires_at: self.clock.now() + Duration::minutes(RESET_TTL_MINUTES),
        };
        self.directory.insert_reset_token(&token).await?;

        tracing::info!(user_id = %account.id, "password reset requested");
        self.dispatcher.dispatch(Notification {
            to: account.email.clone(),
            recipient_name: account.full_name(),
            kind: NotificationKind::PasswordReset,
            secret: token.token,
        });

        Ok(())
    }

    /// Consumes a reset token: on success the new password hash is stored
    /// and the token deleted in one atomic unit, so it can never be
    /// replayed.
    pub async fn consume(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError> {
        let reset = self
            .directory
            .find_reset_token(token)
            .await?
            .ok_or(ResetError::TokenInvalid)?;

        if reset.is_expired(self.clock.now()) {
            return Err(ResetError::TokenExpired.into());
        }
        if new_password != confirm_password {
            return Err(ResetError::PasswordMismatch.into());
        }
        validate_password_strength(new_password)?;

        let hash = self.hasher.encode(new_password)?;
        self.directory
            .consume_reset_token(token, reset.account_id, &hash)
            .await?;

        tracing::info!(user_id = %reset.account_id, "password reset completed");
        Ok(())
    }

    /// Change-password for a logged-in principal: requires the current
    /// password and a matching confirmation.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError> {
        let account = self
            .directory
            .find_account_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !self
            .hasher
            .matches(current_password, &account.password_hash)?
        {
            return Err(AuthError::InvalidCredentials.into());
        }
        if new_password != confirm_password {
            return Err(ResetError::PasswordMismatch.into());
        }
        validate_password_strength(new_password)?;

        let hash = self.hasher.encode(new_password)?;
        self.directory.update_password_hash(account.id, &hash).await?;

        tracing::info!(user_id = %account.id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{Account, Role};
    use crate::auth::password::BcryptHasher;
    use crate::clock::ManualClock;
    use crate::email_client::RecordingDispatcher;
    use crate::store::InMemoryDirectory;
    use chrono::Utc;

    struct Fixture {
        manager: PasswordResetManager,
        directory: Arc<InMemoryDirectory>,
        dispatcher: Arc<RecordingDispatcher>,
        clock: Arc<ManualClock>,
        hasher: Arc<BcryptHasher>,
    }

    async fn fixture_with_account(email: &str, password: &str) -> (Fixture, Account) {
        let directory = Arc::new(InMemoryDirectory::new());
        let hasher = Arc::new(BcryptHasher::with_cost(4));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = PasswordResetManager::new(
            directory.clone(),
            hasher.clone(),
            dispatcher.clone(),
            clock.clone(),
        );

        let account = Account {
            id: Uuid::new_v4(),
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            email: email.into(),
            password_hash: hasher.encode(password).unwrap(),
            role: Role::User,
            enabled: true,
            phone_number: None,
            created_at: clock.now(),
        };
        directory.insert_account(&account).await.unwrap();

        (
            Fixture {
                manager,
                directory,
                dispatcher,
                clock,
                hasher,
            },
            account,
        )
    }

    #[tokio::test]
    async fn reset_round_trip_is_single_use() {
        let (fx, account) = fixture_with_account("user@test.com", "oldpassword1").await;

        fx.manager.request("user@test.com").await.unwrap();
        let token = fx
            .dispatcher
            .last_secret(NotificationKind::PasswordReset)
            .expect("reset mail dispatched");

        let stored = fx.directory.find_reset_token(&token).await.unwrap().unwrap();
        assert_eq!(
            stored.expires_at - fx.clock.now(),
            Duration::minutes(RESET_TTL_MINUTES)
        );

        fx.manager
            .consume(&token, "newpass123", "newpass123")
            .await
            .unwrap();

        let updated = fx.directory.find_account_by_id(account.id).await.unwrap().unwrap();
        assert!(fx.hasher.matches("newpass123", &updated.password_hash).unwrap());
        assert_ne!(updated.password_hash, account.password_hash);

        // Consumed tokens are gone: replay fails as invalid, not expired.
        assert!(fx.directory.find_reset_token(&token).await.unwrap().is_none());
        let err = fx
            .manager
            .consume(&token, "another123", "another123")
            .await
            .unwrap_err();
        match err {
            AppError::Reset(ResetError::TokenInvalid) => (),
            other => panic!("expected TokenInvalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn request_for_unknown_email_fails() {
        let (fx, _) = fixture_with_account("user@test.com", "oldpassword1").await;
        let err = fx.manager.request("ghost@test.com").await.unwrap_err();
        match err {
            AppError::Auth(AuthError::AccountNotFound) => (),
            other => panic!("expected AccountNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (fx, _) = fixture_with_account("user@test.com", "oldpassword1").await;
        fx.manager.request("user@test.com").await.unwrap();
        let token = fx
            .dispatcher
            .last_secret(NotificationKind::PasswordReset)
            .unwrap();

        fx.clock.advance(Duration::minutes(RESET_TTL_MINUTES + 1));

        let err = fx
            .manager
            .consume(&token, "newpass123", "newpass123")
            .await
            .unwrap_err();
        match err {
            AppError::Reset(ResetError::TokenExpired) => (),
            other => panic!("expected TokenExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected_and_token_survives() {
        let (fx, _) = fixture_with_account("user@test.com", "oldpassword1").await;
        fx.manager.request("user@test.com").await.unwrap();
        let token = fx
            .dispatcher
            .last_secret(NotificationKind::PasswordReset)
            .unwrap();

        let err = fx
            .manager
            .consume(&token, "newpass123", "different123")
            .await
            .unwrap_err();
        match err {
            AppError::Reset(ResetError::PasswordMismatch) => (),
            other => panic!("expected PasswordMismatch, got {:?}", other),
        }
        assert!(fx.directory.find_reset_token(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let (fx, account) = fixture_with_account("user@test.com", "oldpassword1").await;

        let err = fx
            .manager
            .change_password(account.id, "wrongcurrent", "newpass123", "newpass123")
            .await
            .unwrap_err();
        match err {
            AppError::Auth(AuthError::InvalidCredentials) => (),
            other => panic!("expected InvalidCredentials, got {:?}", other),
        }

        fx.manager
            .change_password(account.id, "oldpassword1", "newpass123", "newpass123")
            .await
            .unwrap();
        let updated = fx.directory.find_account_by_id(account.id).await.unwrap().unwrap();
        assert!(fx.hasher.matches("newpass123", &updated.password_hash).unwrap());
    }
}
