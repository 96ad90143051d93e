//! Process configuration from the environment.
//! Used by: main, state.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::ratelimit::LimiterConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub identity_limit: LimiterConfig,
    pub origin_limit: LimiterConfig,
    pub token_expiry: Duration,
    pub token_capacity: usize,
    pub janitor_interval: Duration,
    pub reset_base_url: Url,
    pub password_min_length: usize,
    pub dev_accounts: Vec<DevAccount>,
}

/// `username:email:password`, seeded into the in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            identity_limit: LimiterConfig::identity_default(),
            origin_limit: LimiterConfig::origin_default(),
            token_expiry: Duration::from_secs(15 * 60),
            token_capacity: 10_000,
            janitor_interval: Duration::from_secs(300),
            reset_base_url: default_base_url(),
            password_min_length: 8,
            dev_accounts: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let parsed = |key: &str| -> Option<String> { lookup(key).filter(|v| !v.trim().is_empty()) };

        let limiter = |prefix: &str, fallback: LimiterConfig| LimiterConfig {
            max_requests: number(&parsed, &format!("{prefix}_RATE_LIMIT_MAX"), fallback.max_requests),
            window: Duration::from_secs(number(
                &parsed,
                &format!("{prefix}_RATE_LIMIT_WINDOW_SECS"),
                fallback.window.as_secs(),
            )),
            capacity: number(&parsed, &format!("{prefix}_RATE_LIMIT_CAPACITY"), fallback.capacity),
        };

        let reset_base_url = match parsed("RESET_BASE_URL") {
            Some(raw) => Url::parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "invalid RESET_BASE_URL, using default");
                default_base_url()
            }),
            None => d.reset_base_url,
        };

        Self {
            bind_addr: parsed("BIND_ADDR").unwrap_or(d.bind_addr),
            identity_limit: limiter("IDENTITY", d.identity_limit),
            origin_limit: limiter("ORIGIN", d.origin_limit),
            token_expiry: minutes(&parsed, "RESET_TOKEN_EXPIRY_MINUTES", d.token_expiry),
            token_capacity: number(&parsed, "RESET_TOKEN_CAPACITY", d.token_capacity),
            janitor_interval: Duration::from_secs(number(
                &parsed,
                "JANITOR_INTERVAL_SECS",
                d.janitor_interval.as_secs(),
            )),
            reset_base_url,
            password_min_length: number(&parsed, "PASSWORD_MIN_LENGTH", d.password_min_length),
            dev_accounts: parsed("DEV_ACCOUNTS")
                .map(|raw| parse_dev_accounts(&raw))
                .unwrap_or_default(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL parses")
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}

fn minutes(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    let value = number(lookup, key, default.as_secs() / 60);
    match value.checked_mul(60) {
        Some(secs) => Duration::from_secs(secs),
        None => {
            tracing::warn!(key, value, default = ?default, "setting out of range, using default");
            default
        }
    }
}

fn parse_dev_accounts(raw: &str) -> Vec<DevAccount> {
    raw.split(',')
        .filter_map(|entry| {
            let mut parts = entry.trim().splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(u), Some(e), Some(p)) if !u.is_empty() && !e.is_empty() && !p.is_empty() => {
                    Some(DevAccount { username: u.into(), email: e.into(), password: p.into() })
                }
                _ => {
                    tracing::warn!("skipping malformed DEV_ACCOUNTS entry");
                    None
                }
            }
        })
        .collect()
}
