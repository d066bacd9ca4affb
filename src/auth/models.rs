/// Domain entities owned by the credential store: accounts, issued tokens,
/// activation codes and reset tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed, totally ordered role set: `User < Manager < Admin`.
///
/// Authorization uses this order plus the static capability table below;
/// there are no inheritance chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Manager,
    Admin,
}

/// What a role is allowed to do. Kept coarse: fine-grained checks belong
/// to the excluded business layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SelfService,
    ReviewTransfers,
    ManageAccounts,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "USER" => Some(Role::User),
            "MANAGER" => Some(Role::Manager),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Static role -> capability table.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::User => &[Capability::SelfService],
            Role::Manager => &[Capability::SelfService, Capability::ReviewTransfers],
            Role::Admin => &[
                Capability::SelfService,
                Capability::ReviewTransfers,
                Capability::ManageAccounts,
            ],
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// An account record. Created on registration, enabled exactly once on
/// activation, never deleted by this core.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn has_phone_number(&self) -> bool {
        self.phone_number
            .as_deref()
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
        }
    }

    pub fn parse(s: &str) -> Option<TokenKind> {
        match s {
            "ACCESS" => Some(TokenKind::Access),
            "REFRESH" => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

/// Ledger row for one issued token. Only the SHA-256 hash of the token
/// string is kept at rest.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token_hash: String,
    pub account_id: Uuid,
    pub kind: TokenKind,
    pub expired: bool,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Ledger-side usability only; the embedded expiry is the codec's job.
    pub fn is_usable(&self) -> bool {
        !self.expired && !self.revoked
    }
}

/// Short-lived numeric email-activation code. Consumed at most once and
/// kept as a historical record afterwards.
#[derive(Debug, Clone)]
pub struct ActivationCode {
    pub code: String,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ActivationCode {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.validated_at.is_none() && now < self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Single-use password-reset token; presence in the store implies it has
/// not been consumed.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The principal the request gate attaches to a request once a bearer
/// token has been fully validated.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(Role::User < Role::Manager);
        assert!(Role::Manager < Role::Admin);
        assert!(Role::Admin >= Role::User);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Manager, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("SUPERUSER"), None);
    }

    #[test]
    fn capability_table_is_cumulative_over_the_order() {
        assert!(Role::User.has_capability(Capability::SelfService));
        assert!(!Role::User.has_capability(Capability::ReviewTransfers));
        assert!(Role::Manager.has_capability(Capability::ReviewTransfers));
        assert!(!Role::Manager.has_capability(Capability::ManageAccounts));
        assert!(Role::Admin.has_capability(Capability::ManageAccounts));
    }

    #[test]
    fn activation_code_active_window() {
        let now = Utc::now();
        let code = ActivationCode {
            code: "123456".into(),
            account_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + Duration::minutes(15),
            validated_at: None,
        };
        assert!(code.is_active(now));
        assert!(!code.is_active(now + Duration::minutes(15)));
        assert!(code.is_expired(now + Duration::minutes(15)));

        let used = ActivationCode {
            validated_at: Some(now),
            ..code
        };
        assert!(!used.is_active(now));
    }

    #[test]
    fn ledger_row_usable_only_with_both_flags_clear() {
        let row = IssuedToken {
            token_hash: "abc".into(),
            account_id: Uuid::new_v4(),
            kind: TokenKind::Access,
            expired: false,
            revoked: false,
            created_at: Utc::now(),
        };
        assert!(row.is_usable());
        assert!(!IssuedToken { revoked: true, ..row.clone() }.is_usable());
        assert!(!IssuedToken { expired: true, ..row }.is_usable());
    }
}
