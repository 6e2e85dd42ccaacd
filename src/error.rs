//! # error
//!
//! Error taxonomy for one scrape run.
//! Error ที่หยุดทั้งรอบ vs. Error ที่ทิ้งแค่ Tier เดียว
//!
//! Fatal errors ([`ConfigError`], [`SessionError`], [`DeliveryError`]) end the
//! run and surface through [`RunError`].  [`TierRejection`] is recoverable:
//! the tier contributes zero records and the loop moves on.

use thiserror::Error;

/// Longest body excerpt attached to a per-tier rejection.
pub const TIER_EXCERPT_CHARS: usize = 300;
/// Longest body excerpt attached to a webhook failure.
pub const DELIVERY_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing env {0}")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key:    &'static str,
        value:  String,
        reason: String,
    },

    #[error("{key} is not a usable URL: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u128 },

    #[error("in-page script failed: {0}")]
    Script(String),

    #[error("devtools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// Why a tier contributed zero records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierRejection {
    #[error("API status {status}: {excerpt}")]
    Status { status: u16, excerpt: String },

    #[error("API returned HTML (bot challenge?): {excerpt}")]
    HtmlChallenge { excerpt: String },

    #[error("API returned invalid JSON ({reason}): {excerpt}")]
    InvalidJson { reason: String, excerpt: String },

    #[error("API JSON is not an object keyed by symbol: {excerpt}")]
    NotAnObject { excerpt: String },

    #[error("API request failed: {reason}")]
    Transport { reason: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook error {status}: {excerpt}")]
    Rejected { status: u16, excerpt: String },

    /// Built with [`reqwest::Error::without_url`]: the webhook path is a secret.
    #[error("webhook unreachable: {0}")]
    Transport(reqwest::Error),
}

/// Anything that aborts the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("browser session: {0}")]
    Session(#[from] SessionError),

    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
