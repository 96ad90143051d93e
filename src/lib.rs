//! resetgate: abuse control and single-use reset tokens for a self-service
//! password portal.
//!
//! The core is [`ratelimit::Limiter`], [`reset::TokenStore`] and the
//! [`janitor::Janitor`] that sweeps them; the rest is the HTTP surface and the
//! seams to the directory server and mail delivery.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod janitor;
pub mod mailer;
pub mod ratelimit;
pub mod reset;
pub mod server;
pub mod state;
pub mod telemetry;
