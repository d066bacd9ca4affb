/// Postgres-backed `AccountDirectory`.
///
/// Multi-step mutations run inside a transaction with a `FOR UPDATE` row
/// lock on the owning account, which serializes concurrent logins on the
/// same account so a revoke sweep can never run after a competing record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::models::{Account, ActivationCode, IssuedToken, ResetToken, Role, TokenKind};
use crate::error::AppError;
use crate::store::AccountDirectory;

pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type AccountRow = (
    Uuid,
    String,
    String,
    String,
    String,
    String,
    bool,
    Option<String>,
    DateTime<Utc>,
);

fn account_from_row(row: AccountRow) -> Result<Account, AppError> {
    let (id, firstname, lastname, email, password_hash, role, enabled, phone_number, created_at) =
        row;
    let role = Role::parse(&role)
        .ok_or_else(|| AppError::Store(format!("unknown role '{}' for account {}", role, id)))?;
    Ok(Account {
        id,
        firstname,
        lastname,
        email,
        password_hash,
        role,
        enabled,
        phone_number,
        created_at,
    })
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, firstname, lastname, email, password_hash, role, enabled, phone_number, created_at
    FROM accounts
"#;

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, firstname, lastname, email, password_hash, role, enabled, phone_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.id)
        .bind(&account.firstname)
        .bind(&account.lastname)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.enabled)
        .bind(&account.phone_number)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE email = $1", SELECT_ACCOUNT))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(account_from_row).transpose()
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE id = $1", SELECT_ACCOUNT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(account_from_row).transpose()
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_phone_number(&self, id: Uuid, phone: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET phone_number = $1 WHERE id = $2")
            .bind(phone)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET role = $1 WHERE id = $2")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_issued_token(&self, token: &IssuedToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO issued_tokens (token_hash, account_id, kind, expired, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.account_id)
        .bind(token.kind.as_str())
        .bind(token.expired)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_issued_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<IssuedToken>, AppError> {
        let row = sqlx::query_as::<_, (String, Uuid, String, bool, bool, DateTime<Utc>)>(
            r#"
            SELECT token_hash, account_id, kind, expired, revoked, created_at
            FROM issued_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some((token_hash, account_id, kind, expired, revoked, created_at)) => {
                let kind = TokenKind::parse(&kind).ok_or_else(|| {
                    AppError::Store(format!("unknown token kind '{}'", kind))
                })?;
                Ok(Some(IssuedToken {
                    token_hash,
                    account_id,
                    kind,
                    expired,
                    revoked,
                    created_at,
                }))
            }
        }
    }

    async fn revoke_live_tokens(&self, account_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE issued_tokens
            SET expired = true, revoked = true
            WHERE account_id = $1 AND expired = false AND revoked = false
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_issued_token(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE issued_tokens SET expired = true, revoked = true WHERE token_hash = $1",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_and_record(&self, token: &IssuedToken) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the account serializes concurrent login sweeps.
        sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(token.account_id)
            .fetch_optional(&mut tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE issued_tokens
            SET expired = true, revoked = true
            WHERE account_id = $1 AND expired = false AND revoked = false
            "#,
        )
        .bind(token.account_id)
        .execute(&mut tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO issued_tokens (token_hash, account_id, kind, expired, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.account_id)
        .bind(token.kind.as_str())
        .bind(token.expired)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_activation_code(&self, code: &ActivationCode) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activation_codes (id, code, account_id, created_at, expires_at, validated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&code.code)
        .bind(code.account_id)
        .bind(code.created_at)
        .bind(code.expires_at)
        .bind(code.validated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_activation_code(
        &self,
        code: &str,
    ) -> Result<Option<ActivationCode>, AppError> {
        let row = sqlx::query_as::<
            _,
            (String, Uuid, DateTime<Utc>, DateTime<Utc>, Option<DateTime<Utc>>),
        >(
            r#"
            SELECT code, account_id, created_at, expires_at, validated_at
            FROM activation_codes
            WHERE code = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(code, account_id, created_at, expires_at, validated_at)| ActivationCode {
                code,
                account_id,
                created_at,
                expires_at,
                validated_at,
            },
        ))
    }

    async fn expire_active_codes(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE activation_codes
            SET expires_at = $2
            WHERE account_id = $1 AND validated_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(account_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_activation(
        &self,
        account_id: Uuid,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE accounts SET enabled = true WHERE id = $1")
            .bind(account_id)
            .execute(&mut tx)
            .await?;

        sqlx::query(
            "UPDATE activation_codes SET validated_at = $3 WHERE code = $1 AND account_id = $2",
        )
        .bind(code)
        .bind(account_id)
        .bind(at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_reset_token(&self, token: &ResetToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO reset_tokens (token, account_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token)
        .bind(token.account_id)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<ResetToken>, AppError> {
        let row = sqlx::query_as::<_, (String, Uuid, DateTime<Utc>)>(
            "SELECT token, account_id, expires_at FROM reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(token, account_id, expires_at)| ResetToken {
            token,
            account_id,
            expires_at,
        }))
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        account_id: Uuid,
        new_password_hash: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(new_password_hash)
            .bind(account_id)
            .execute(&mut tx)
            .await?;

        sqlx::query("DELETE FROM reset_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
