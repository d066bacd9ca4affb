/// Authentication orchestrator.
///
/// Composes the codec, ledger, verification-code manager and the injected
/// collaborators (credential store, password hasher, notification
/// dispatcher, clock) into the register / authenticate / refresh /
/// activate / resend flows, and enforces the cross-cutting rules:
/// revoke-on-issue and disabled-account gating.
///
/// Conceptual account states: Unregistered -> PendingActivation -> Active.
/// `activate_account` is the only transition into Active, and Active is
/// never reversed here.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{decode_token, issue_access_token, issue_refresh_token};
use crate::auth::ledger::TokenLedger;
use crate::auth::models::{Account, Role, TokenKind};
use crate::auth::password::{validate_password_strength, PasswordHasher};
use crate::auth::verification::VerificationCodeManager;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::email_client::{Notification, NotificationDispatcher, NotificationKind};
use crate::error::{ActivationError, AppError, AuthError, TokenError};
use crate::store::AccountDirectory;
use crate::validators::{is_valid_email, is_valid_name, is_valid_phone_number};

/// What a successful login-shaped operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
}

pub struct AuthService {
    directory: Arc<dyn AccountDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    jwt: JwtSettings,
    ledger: TokenLedger,
    verification: VerificationCodeManager,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        jwt: JwtSettings,
    ) -> Self {
        let ledger = TokenLedger::new(directory.clone(), clock.clone());
        let verification = VerificationCodeManager::new(directory.clone(), clock.clone());
        Self {
            directory,
            hasher,
            dispatcher,
            clock,
            jwt,
            ledger,
            verification,
        }
    }

    fn issue_pair(&self, account: &Account) -> Result<TokenPair, AppError> {
        let now = self.clock.now();
        Ok(TokenPair {
            access_token: issue_access_token(&account.email, account.role, &self.jwt, now)?,
            refresh_token: issue_refresh_token(&account.email, account.role, &self.jwt, now)?,
            role: account.role,
        })
    }

    async fn send_activation_email(&self, account: &Account) -> Result<(), AppError> {
        let code = self.verification.mint(account.id).await?;
        self.dispatcher.dispatch(Notification {
            to: account.email.clone(),
            recipient_name: account.full_name(),
            kind: NotificationKind::AccountActivation,
            secret: code,
        });
        Ok(())
    }

    /// Creates a disabled USER account, issues the first token pair,
    /// records the access token, and requests an activation mail.
    /// Delivery is best-effort and never rolls back the registration.
    pub async fn register(
        &self,
        firstname: &str,
        lastname: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AppError> {
        let email = is_valid_email(email)?;
        let firstname = is_valid_name(firstname, "firstname")?;
        let lastname = is_valid_name(lastname, "lastname")?;
        validate_password_strength(password)?;

        if self.directory.email_exists(&email).await? {
            return Err(AuthError::DuplicateEmail.into());
        }

        let account = Account {
            id: Uuid::new_v4(),
            firstname,
            lastname,
            email,
            password_hash: self.hasher.encode(password)?,
            role: Role::User,
            enabled: false,
            phone_number: None,
            created_at: self.clock.now(),
        };
        self.directory.insert_account(&account).await?;

        let pair = self.issue_pair(&account)?;
        self.ledger
            .record(account.id, &pair.access_token, TokenKind::Access)
            .await?;

        self.send_activation_email(&account).await?;

        tracing::info!(user_id = %account.id, "user registered");
        Ok(pair)
    }

    /// Three distinguishable outcomes: tokens, `AccountDisabled`
    /// (credentials correct but email unverified, so the caller can say
    /// "verify your email"), or `InvalidCredentials`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let account = self
            .directory
            .find_account_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.matches(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !account.enabled {
            return Err(AuthError::AccountDisabled.into());
        }

        let pair = self.issue_pair(&account)?;
        self.ledger
            .revoke_and_record(account.id, &pair.access_token, TokenKind::Access)
            .await?;

        tracing::info!(user_id = %account.id, "user authenticated");
        Ok(pair)
    }

    /// Exchanges a refresh token presented as `Authorization: Bearer ...`
    /// for a new access token; the refresh token itself is returned
    /// unchanged. An absent or unrecognizable bearer is a typed error,
    /// not a silent no-op, so callers can tell failure from success.
    pub async fn refresh_token(
        &self,
        auth_header: Option<&str>,
    ) -> Result<TokenPair, AppError> {
        let refresh_token = auth_header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(TokenError::Malformed)?;

        let claims = decode_token(refresh_token, &self.jwt)?;
        let account = self
            .directory
            .find_account_by_email(&claims.sub)
            .await?
            .ok_or(TokenError::Invalid)?;

        let access_token =
            issue_access_token(&account.email, account.role, &self.jwt, self.clock.now())?;
        self.ledger
            .revoke_and_record(account.id, &access_token, TokenKind::Access)
            .await?;

        tracing::info!(user_id = %account.id, "access token refreshed");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
            role: account.role,
        })
    }

    /// The only transition into Active. Outcome order matters: a consumed
    /// code reports `CodeAlreadyUsed` even if it has since also expired.
    pub async fn activate_account(&self, code: &str) -> Result<(), AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ActivationError::CodeEmpty.into());
        }

        let saved = self
            .directory
            .find_activation_code(code)
            .await?
            .ok_or(ActivationError::CodeInvalid)?;

        let now = self.clock.now();
        if saved.validated_at.is_some() {
            return Err(ActivationError::CodeAlreadyUsed.into());
        }
        if saved.is_expired(now) {
            return Err(ActivationError::CodeExpired.into());
        }

        let account = self
            .directory
            .find_account_by_id(saved.account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        if account.enabled {
            return Err(ActivationError::AccountAlreadyActivated.into());
        }

        self.directory
            .complete_activation(account.id, code, now)
            .await?;

        tracing::info!(user_id = %account.id, "account activated");
        Ok(())
    }

    /// Invalidates any still-active codes, then mints and mails a new one.
    pub async fn resend_email_verification(&self, email: &str) -> Result<(), AppError> {
        let account = self
            .directory
            .find_account_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if account.enabled {
            return Err(ActivationError::AccountAlreadyVerified.into());
        }

        self.verification.invalidate_active(account.id).await?;
        self.send_activation_email(&account).await?;

        tracing::info!(user_id = %account.id, "verification email resent");
        Ok(())
    }

    /// Pure lookup, no side effects.
    pub async fn user_exists(&self, email: &str) -> Result<bool, AppError> {
        self.directory.email_exists(email).await
    }

    /// Revokes exactly the presented bearer token in the ledger. A missing
    /// or non-Bearer header is a silent no-op: there is no session to end.
    pub async fn logout(&self, auth_header: Option<&str>) -> Result<(), AppError> {
        let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => token,
            None => return Ok(()),
        };
        self.ledger.revoke(token).await?;
        tracing::info!("user logged out");
        Ok(())
    }

    /// Narrow entry point for the external federated-identity layer: the
    /// provider has already proven control of the email, so this only
    /// issues tokens under the same revoke-on-issue rule.
    pub async fn federated_login(&self, email: &str) -> Result<TokenPair, AppError> {
        let account = self
            .directory
            .find_account_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.enabled {
            return Err(AuthError::AccountDisabled.into());
        }

        let pair = self.issue_pair(&account)?;
        self.ledger
            .revoke_and_record(account.id, &pair.access_token, TokenKind::Access)
            .await?;

        tracing::info!(user_id = %account.id, "federated login");
        Ok(pair)
    }

    pub async fn update_phone_number(
        &self,
        account_id: Uuid,
        phone_number: &str,
    ) -> Result<(), AppError> {
        let phone = is_valid_phone_number(phone_number)?;
        self.directory
            .update_phone_number(account_id, &phone)
            .await
    }

    pub async fn has_phone_number(&self, account_id: Uuid) -> Result<bool, AppError> {
        let account = self
            .directory
            .find_account_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        Ok(account.has_phone_number())
    }

    /// Admin-gated role change; the capability check happens at the route.
    pub async fn update_user_role(&self, account_id: Uuid, role: Role) -> Result<(), AppError> {
        if self
            .directory
            .find_account_by_id(account_id)
            .await?
            .is_none()
        {
            return Err(AuthError::AccountNotFound.into());
        }
        self.directory.update_role(account_id, role).await?;
        tracing::info!(user_id = %account_id, role = role.as_str(), "role updated");
        Ok(())
    }

    /// The ledger view the request gate shares.
    pub fn ledger(&self) -> TokenLedger {
        self.ledger.clone()
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::BcryptHasher;
    use crate::clock::ManualClock;
    use crate::email_client::RecordingDispatcher;
    use crate::store::InMemoryDirectory;
    use chrono::Utc;

    struct Fixture {
        service: AuthService,
        directory: Arc<InMemoryDirectory>,
    }

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".into(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "saraf-test".into(),
        }
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let service = AuthService::new(
            directory.clone(),
            Arc::new(BcryptHasher::with_cost(4)),
            Arc::new(RecordingDispatcher::new()),
            Arc::new(ManualClock::new(Utc::now())),
            jwt_settings(),
        );
        Fixture { service, directory }
    }

    async fn insert_account(fx: &Fixture, email: &str, enabled: bool) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            email: email.into(),
            password_hash: "$2b$04$hash".into(),
            role: Role::User,
            enabled,
            phone_number: None,
            created_at: Utc::now(),
        };
        fx.directory.insert_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn user_exists_reflects_the_directory() {
        let fx = fixture();
        insert_account(&fx, "jane@x.com", true).await;

        assert!(fx.service.user_exists("jane@x.com").await.unwrap());
        assert!(!fx.service.user_exists("ghost@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn federated_login_rejects_unknown_and_disabled_accounts() {
        let fx = fixture();

        let err = fx.service.federated_login("ghost@x.com").await.unwrap_err();
        match err {
            AppError::Auth(AuthError::AccountNotFound) => (),
            other => panic!("expected AccountNotFound, got {:?}", other),
        }

        insert_account(&fx, "pending@x.com", false).await;
        let err = fx
            .service
            .federated_login("pending@x.com")
            .await
            .unwrap_err();
        match err {
            AppError::Auth(AuthError::AccountDisabled) => (),
            other => panic!("expected AccountDisabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn federated_login_issues_tokens_under_revoke_on_issue() {
        let fx = fixture();
        insert_account(&fx, "jane@x.com", true).await;

        let first = fx.service.federated_login("jane@x.com").await.unwrap();
        let second = fx.service.federated_login("jane@x.com").await.unwrap();
        assert_eq!(second.role, Role::User);

        let ledger = fx.service.ledger();
        assert!(!ledger.is_usable(&first.access_token).await.unwrap());
        assert!(ledger.is_usable(&second.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn logout_revokes_the_presented_token_only() {
        let fx = fixture();
        insert_account(&fx, "jane@x.com", true).await;
        let pair = fx.service.federated_login("jane@x.com").await.unwrap();

        let header = format!("Bearer {}", pair.access_token);
        fx.service.logout(Some(&header)).await.unwrap();

        assert!(!fx
            .service
            .ledger()
            .is_usable(&pair.access_token)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn logout_without_a_bearer_header_touches_nothing() {
        let fx = fixture();
        insert_account(&fx, "jane@x.com", true).await;
        let pair = fx.service.federated_login("jane@x.com").await.unwrap();

        fx.service.logout(None).await.unwrap();
        fx.service.logout(Some("InvalidPrefix jwt")).await.unwrap();

        assert!(fx
            .service
            .ledger()
            .is_usable(&pair.access_token)
            .await
            .unwrap());
    }
}
