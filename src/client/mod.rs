//! HTTP clients for the query API and the ingestion endpoint.
//!
//! This module provides the [`NautobotClient`] (rate limited by a shared
//! [`RateLimiter`]) and the [`HecClient`], along with authentication types
//! ([`Auth`], [`AuthType`]).

mod auth;
mod hec;
mod nautobot;
mod rate_limit;

pub use auth::{Auth, AuthType};
pub use hec::HecClient;
pub use nautobot::NautobotClient;
pub use rate_limit::RateLimiter;

/// Keep error bodies short enough for a log line
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
