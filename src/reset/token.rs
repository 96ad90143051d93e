//! Reset token generation and the per-grant record.
//! Used by: reset::store, handlers::reset.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::Result;

/// 256 bits of entropy.
pub const TOKEN_BYTES: usize = 32;

/// Longest lifetime a reset token may be given.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Mints a bearer secret safe to drop straight into a link query parameter.
/// Only the OS CSPRNG is used; if it is unavailable the error propagates.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub token: String,
    pub username: String,
    pub email: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub used: bool,
    /// Reserved for an approval step; never set today.
    pub requires_approval: bool,
}

impl ResetToken {
    /// `ttl` is capped at [`MAX_TTL`]; if the deadline still cannot be
    /// represented the token is born expired.
    pub fn new(token: String, username: String, email: String, now: Instant, ttl: Duration) -> Self {
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        Self {
            token,
            username,
            email,
            created_at: now,
            expires_at,
            used: false,
            requires_approval: false,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Unused and unexpired. Callers must not tell users which half failed.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}

// The token string is a bearer secret; keep it out of logs.
impl std::fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetToken")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("used", &self.used)
            .field("requires_approval", &self.requires_approval)
            .finish()
    }
}
