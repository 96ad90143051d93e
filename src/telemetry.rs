//! Metrics tracking.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ratelimit::RateLimitError;

#[derive(Default)]
pub struct Metrics {
    pub password_changes: AtomicU64,
    pub password_change_failures: AtomicU64,
    pub reset_requests: AtomicU64,
    pub reset_links_sent: AtomicU64,
    pub reset_issue_failures: AtomicU64,
    pub resets_completed: AtomicU64,
    pub resets_rejected: AtomicU64,
    pub rate_limited_origin: AtomicU64,
    pub rate_limited_identity: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_password_change(&self) {
        self.password_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_password_change_failure(&self) {
        self.password_change_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_request(&self) {
        self.reset_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_link_sent(&self) {
        self.reset_links_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_issue_failure(&self) {
        self.reset_issue_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_completed(&self) {
        self.resets_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset_rejected(&self) {
        self.resets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self, which: RateLimitError) {
        let counter = match which {
            RateLimitError::Origin => &self.rate_limited_origin,
            RateLimitError::Identity => &self.rate_limited_identity,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            password_changes: self.password_changes.load(Ordering::Relaxed),
            password_change_failures: self.password_change_failures.load(Ordering::Relaxed),
            reset_requests: self.reset_requests.load(Ordering::Relaxed),
            reset_links_sent: self.reset_links_sent.load(Ordering::Relaxed),
            reset_issue_failures: self.reset_issue_failures.load(Ordering::Relaxed),
            resets_completed: self.resets_completed.load(Ordering::Relaxed),
            resets_rejected: self.resets_rejected.load(Ordering::Relaxed),
            rate_limited_origin: self.rate_limited_origin.load(Ordering::Relaxed),
            rate_limited_identity: self.rate_limited_identity.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub password_changes: u64,
    pub password_change_failures: u64,
    pub reset_requests: u64,
    pub reset_links_sent: u64,
    pub reset_issue_failures: u64,
    pub resets_completed: u64,
    pub resets_rejected: u64,
    pub rate_limited_origin: u64,
    pub rate_limited_identity: u64,
}
