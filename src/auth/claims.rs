/// JWT claims carried by both access and refresh tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::models::Role;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the account email.
    pub sub: String,
    /// Token id: makes every minted token unique even when subject, role
    /// and timestamps coincide (iat/exp have second granularity).
    pub jti: String,
    /// Role at issue time. Informational for clients; the request gate
    /// re-derives the authoritative role from the store.
    pub role: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Issuer.
    pub iss: String,
}

impl Claims {
    pub fn new(
        email: &str,
        role: Role,
        ttl_seconds: i64,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            sub: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            role: role.as_str().to_string(),
            exp: iat + ttl_seconds,
            iat,
            iss: issuer.to_string(),
        }
    }

    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
