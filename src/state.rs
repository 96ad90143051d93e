//! Shared application state.

use std::sync::Arc;

use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::directory::{Directory, MemoryDirectory};
use crate::janitor::Sweep;
use crate::mailer::{LogMailer, Mailer};
use crate::ratelimit::{Limiter, RequestGuard};
use crate::reset::TokenStore;
use crate::telemetry::Metrics;

pub struct AppStateInner {
    pub guard: RequestGuard,
    pub tokens: Arc<TokenStore>,
    pub directory: Arc<dyn Directory>,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Metrics,
    pub reset_base_url: Url,
    pub password_min_length: usize,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Everything the janitor should sweep.
    pub fn sweep_targets(&self) -> Vec<Arc<dyn Sweep>> {
        vec![
            self.guard.origin().clone(),
            self.guard.identity().clone(),
            self.tokens.clone(),
        ]
    }
}

pub struct StateBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn Directory>,
    mailer: Arc<dyn Mailer>,
}

impl StateBuilder {
    pub fn new(config: Config, directory: Arc<dyn Directory>, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, clock: Arc::new(SystemClock), directory, mailer }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> AppState {
        let Self { config, clock, directory, mailer } = self;
        let origin = Limiter::with_clock("origin", config.origin_limit, clock.clone());
        let identity = Limiter::with_clock("identity", config.identity_limit, clock.clone());
        let tokens = TokenStore::with_clock(config.token_expiry, config.token_capacity, clock);

        Arc::new(AppStateInner {
            guard: RequestGuard::new(Arc::new(origin), Arc::new(identity)),
            tokens: Arc::new(tokens),
            directory,
            mailer,
            metrics: Metrics::new(),
            reset_base_url: config.reset_base_url,
            password_min_length: config.password_min_length,
        })
    }
}

/// Development wiring: in-memory directory seeded from config, log mailer.
pub fn build_state(config: Config) -> AppState {
    let directory = config.dev_accounts.iter().fold(MemoryDirectory::new(), |dir, acct| {
        dir.with_account(&acct.username, &acct.email, &acct.password)
    });
    tracing::warn!(
        accounts = config.dev_accounts.len(),
        "using in-memory directory and log mailer"
    );
    StateBuilder::new(config, Arc::new(directory), Arc::new(LogMailer)).build()
}
