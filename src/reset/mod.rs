//! Single-use, time-bound password reset grants.
//! Used by: handlers, state, janitor.

pub mod store;
pub mod token;

pub use store::TokenStore;
pub use token::{generate_token, ResetToken};
