//! HTTP handler modules.
//! Used by: server.

pub mod health;
pub mod metrics;
pub mod password;
pub mod reset;

use std::net::SocketAddr;

use crate::error::{Error, Result};
use crate::state::AppStateInner;

const MAX_PASSWORD_LEN: usize = 256;
const MAX_IDENTITY_LEN: usize = 254;

/// Rate-limit key for the caller's network origin.
pub(crate) fn origin_key(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

/// Rate-limit key for a claimed identity; case and padding do not buy extra budget.
pub(crate) fn identity_key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

pub(crate) fn validate_identity(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_IDENTITY_LEN {
        return Err(Error::Validation(format!("{field} must be 1-{MAX_IDENTITY_LEN} characters")));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(Error::Validation(format!("{field} contains control characters")));
    }
    Ok(())
}

pub(crate) fn validate_password(state: &AppStateInner, password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < state.password_min_length || len > MAX_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be {}-{} characters",
            state.password_min_length, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Runs both limiters, recording and logging a refusal.
pub(crate) fn admit(state: &AppStateInner, addr: &SocketAddr, identity: &str) -> Result<()> {
    let origin = origin_key(addr);
    state.guard.check(&origin, &identity_key(identity)).map_err(|which| {
        state.metrics.record_rate_limited(which);
        tracing::warn!(origin = %origin, reason = %which, "request rate limited");
        Error::RateLimited
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::directory::MemoryDirectory;
    use crate::mailer::MemoryMailer;
    use crate::state::{AppState, StateBuilder};

    pub struct Harness {
        pub state: AppState,
        pub directory: Arc<MemoryDirectory>,
        pub mailer: Arc<MemoryMailer>,
        pub clock: ManualClock,
    }

    pub fn harness() -> Harness {
        harness_with(Config::default())
    }

    pub fn harness_with(config: Config) -> Harness {
        let directory = Arc::new(
            MemoryDirectory::new()
                .with_account("alice", "alice@example.com", "old-password")
                .with_account("bob", "bob@example.com", "bob-password"),
        );
        let mailer = Arc::new(MemoryMailer::new());
        let clock = ManualClock::new();
        let state = StateBuilder::new(config, directory.clone(), mailer.clone())
            .clock(Arc::new(clock.clone()))
            .build();
        Harness { state, directory, mailer, clock }
    }

    pub fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 40_000))
    }
}
