/// Verification code manager: short-lived numeric activation codes.

use chrono::Duration;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::models::ActivationCode;
use crate::clock::Clock;
use crate::error::AppError;
use crate::store::AccountDirectory;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 15;

/// Draws the code from the OS entropy source: the code is a bearer secret
/// during its TTL window, so a general-purpose PRNG is not acceptable.
pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..=9u8)))
        .collect()
}

#[derive(Clone)]
pub struct VerificationCodeManager {
    directory: Arc<dyn AccountDirectory>,
    clock: Arc<dyn Clock>,
}

impl VerificationCodeManager {
    pub fn new(directory: Arc<dyn AccountDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self { directory, clock }
    }

    /// Persists a fresh code with the standard TTL and returns its value
    /// for the activation notification.
    pub async fn mint(&self, account_id: Uuid) -> Result<String, AppError> {
        let now = self.clock.now();
        let code = ActivationCode {
            code: generate_code(),
            account_id,
            created_at: now,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
            validated_at: None,
        };
        self.directory.insert_activation_code(&code).await?;
        Ok(code.code)
    }

    /// Sets the expiry of every currently-active code to now, keeping the
    /// rows as history. At most one code stays active per account because
    /// this runs before every mint on the resend path.
    pub async fn invalidate_active(&self, account_id: Uuid) -> Result<(), AppError> {
        self.directory
            .expire_active_codes(account_id, self.clock.now())
            .await
    }
}
