//! In-memory reset token store with expiry and capacity limits.
//! Used by: handlers::reset, state, janitor.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{lock_err, Error, Result};
use crate::janitor::Sweep;
use crate::reset::token::{generate_token, ResetToken, MAX_TTL};

const DEFAULT_MAX_CAPACITY: usize = 10_000;
const ISSUE_ATTEMPTS: usize = 3;

pub struct TokenStore {
    tokens: Mutex<HashMap<String, ResetToken>>,
    expiry: Duration,
    max_capacity: usize,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(expiry: Duration) -> Self {
        Self::with_capacity(expiry, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(expiry: Duration, max_capacity: usize) -> Self {
        Self::with_clock(expiry, max_capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(expiry: Duration, max_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let expiry = if expiry > MAX_TTL {
            tracing::warn!(?expiry, max = ?MAX_TTL, "reset token expiry too large, clamping");
            MAX_TTL
        } else {
            expiry
        };
        Self {
            tokens: Mutex::new(HashMap::new()),
            expiry,
            max_capacity,
            clock,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Builds an unused record stamped with this store's clock and expiry.
    pub fn create(&self, token: String, username: &str, email: &str) -> ResetToken {
        ResetToken::new(token, username.to_owned(), email.to_owned(), self.clock.now(), self.expiry)
    }

    /// Generates, builds and stores a fresh grant, retrying on key collision.
    pub fn issue(&self, username: &str, email: &str) -> Result<ResetToken> {
        for _ in 0..ISSUE_ATTEMPTS {
            let token = self.create(generate_token()?, username, email);
            match self.store(token.clone()) {
                Ok(()) => return Ok(token),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(username, "reset token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::TokenCollision)
    }

    /// Inserts a new grant. An existing key is never overwritten.
    pub fn store(&self, token: ResetToken) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err("reset token"))?;
        if tokens.len() >= self.max_capacity && !tokens.contains_key(&token.token) {
            let now = self.clock.now();
            tokens.retain(|_, t| !t.is_expired_at(now));
            if tokens.len() >= self.max_capacity {
                return Err(Error::StoreFull);
            }
        }
        match tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(Error::TokenCollision),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    /// Raw lookup. Expiry and used-state are left to the caller.
    pub fn get(&self, token: &str) -> Result<ResetToken> {
        let tokens = self.tokens.lock().map_err(lock_err("reset token"))?;
        tokens.get(token).cloned().ok_or(Error::NotFound)
    }

    pub fn mark_used(&self, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err("reset token"))?;
        let record = tokens.get_mut(token).ok_or(Error::NotFound)?;
        record.used = true;
        Ok(())
    }

    pub fn delete(&self, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err("reset token"))?;
        tokens.remove(token).map(|_| ()).ok_or(Error::NotFound)
    }

    /// Checks and consumes a grant in one critical section, so at most one
    /// caller can ever redeem a given token. Unknown, expired and already
    /// used tokens all come back as `InvalidToken`.
    pub fn redeem(&self, token: &str) -> Result<ResetToken> {
        let mut tokens = self.tokens.lock().map_err(lock_err("reset token"))?;
        let now = self.clock.now();
        let record = tokens.get_mut(token).ok_or(Error::InvalidToken)?;
        if !record.is_valid_at(now) {
            return Err(Error::InvalidToken);
        }
        record.used = true;
        Ok(record.clone())
    }

    pub fn is_expired(&self, token: &ResetToken) -> bool {
        token.is_expired_at(self.clock.now())
    }

    pub fn is_valid(&self, token: &ResetToken) -> bool {
        token.is_valid_at(self.clock.now())
    }

    /// Drops every expired grant, used or not.
    pub fn cleanup_expired(&self) -> usize {
        let mut tokens = match self.tokens.lock() {
            Ok(tokens) => tokens,
            Err(_) => {
                tracing::error!("reset token lock poisoned, skipping sweep");
                return 0;
            }
        };
        let now = self.clock.now();
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        before - tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sweep for TokenStore {
    fn name(&self) -> &'static str {
        "reset_tokens"
    }

    fn cleanup_expired(&self) -> usize {
        TokenStore::cleanup_expired(self)
    }
}
