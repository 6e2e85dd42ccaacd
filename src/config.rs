//! # config: อ่าน Config จาก Environment Variables
//!
//! Everything a run needs is resolved here, once, before the browser starts.
//! Components receive `&Config` (or a slice of it) and never read the
//! environment themselves.
//!
//! | Variable               | Default                                   |
//! |------------------------|-------------------------------------------|
//! | `N8N_WEBHOOK_URL`      | **required**                              |
//! | `N8N_TOKEN`            | **required**                              |
//! | `SPEC_PAGE_URL`        | FreshForex forex specification page       |
//! | `SPEC_API_URL`         | FreshForex `specification-param` endpoint |
//! | `NAV_TIMEOUT_MS`       | `60000`                                   |
//! | `SETTLE_MS`            | `6000`                                    |
//! | `FETCH_TIMEOUT_SECS`   | `30`                                      |
//! | `WEBHOOK_TIMEOUT_SECS` | `30`                                      |
//! | `BROWSER_HEADLESS`     | `true`                                    |
//! | `BROWSER_USER_AGENT`   | desktop Chrome 122                        |

use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;
use crate::models::{AccountTier, RequestForm};

pub const DEFAULT_SPEC_PAGE: &str = "https://freshforex.com/traders/trading/specification-forex/";
pub const DEFAULT_API_URL: &str = "https://freshforex.com/api/specification-param/";

/// Headroom of the DevTools command deadline over our own timeouts.
const COMMAND_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// The three account tiers the upstream API knows about.
pub const ACCOUNT_TIERS: [AccountTier; 3] = [
    AccountTier::new(1, "Classic"),
    AccountTier::new(2, "Market Pro"),
    AccountTier::new(3, "ECN"),
];

/// Browser identity used for the bootstrap session.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub headless:   bool,
    pub user_agent: String,
    pub locale:     String,
    pub width:      u32,
    pub height:     u32,
    /// Per-command DevTools deadline.  Always longer than the longest wait
    /// issued through the browser, so `nav_timeout`/`fetch_timeout` fire first.
    pub command_timeout: Duration,
}

/// Config ทั้งหมดที่ run หนึ่งรอบต้องการ
#[derive(Clone)]
pub struct Config {
    /// n8n webhook ที่รับ envelope
    pub webhook_url:      Url,
    /// Token ที่ใส่ไปใน body ของ envelope
    pub webhook_token:    String,
    /// หน้าเว็บที่ต้องเปิดก่อน เพื่อผ่าน bot-mitigation challenge
    pub spec_page_url:    String,
    /// API endpoint ที่ POST form ไป
    pub api_url:          String,
    pub base_form:        RequestForm,
    pub tiers:            Vec<AccountTier>,
    pub nav_timeout:      Duration,
    /// เวลารอให้ challenge script ทำงานเสร็จ หลัง DOMContentLoaded
    pub settle_delay:     Duration,
    /// Deadline ต่อ 1 tier request
    pub fetch_timeout:    Duration,
    pub webhook_timeout:  Duration,
    pub browser:          BrowserProfile,
}

// The token never reaches the logs, even through `{:?}`.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("webhook_host", &self.webhook_host())
            .field("webhook_token", &"<redacted>")
            .field("spec_page_url", &self.spec_page_url)
            .field("api_url", &self.api_url)
            .field("base_form", &self.base_form)
            .field("tiers", &self.tiers)
            .field("nav_timeout", &self.nav_timeout)
            .field("settle_delay", &self.settle_delay)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("webhook_timeout", &self.webhook_timeout)
            .field("browser", &self.browser)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key → value source.
    ///
    /// Required values are checked first so a missing webhook aborts the run
    /// before anything else is parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_raw = required(&lookup, "N8N_WEBHOOK_URL")?;
        let webhook_token = required(&lookup, "N8N_TOKEN")?;

        let webhook_url = Url::parse(&webhook_raw).map_err(|e| ConfigError::InvalidUrl {
            key:    "N8N_WEBHOOK_URL",
            reason: e.to_string(),
        })?;
        if !matches!(webhook_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                key:    "N8N_WEBHOOK_URL",
                reason: format!("unsupported scheme '{}'", webhook_url.scheme()),
            });
        }

        let nav_ms: u64 = parsed(&lookup, "NAV_TIMEOUT_MS", 60_000)?;
        let settle_ms: u64 = parsed(&lookup, "SETTLE_MS", 6_000)?;
        let fetch_secs: u64 = parsed(&lookup, "FETCH_TIMEOUT_SECS", 30)?;
        let webhook_secs: u64 = parsed(&lookup, "WEBHOOK_TIMEOUT_SECS", 30)?;

        let nav_timeout = Duration::from_millis(nav_ms);
        let fetch_timeout = Duration::from_secs(fetch_secs);
        let command_timeout = nav_timeout.max(fetch_timeout) + COMMAND_TIMEOUT_SLACK;

        Ok(Self {
            webhook_url,
            webhook_token,
            spec_page_url:   optional(&lookup, "SPEC_PAGE_URL").unwrap_or_else(|| DEFAULT_SPEC_PAGE.to_string()),
            api_url:         optional(&lookup, "SPEC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            base_form:       RequestForm::forex_default(),
            tiers:           ACCOUNT_TIERS.to_vec(),
            nav_timeout,
            settle_delay:    Duration::from_millis(settle_ms),
            fetch_timeout,
            webhook_timeout: Duration::from_secs(webhook_secs),
            browser: BrowserProfile {
                headless:   flag(&lookup, "BROWSER_HEADLESS", true)?,
                user_agent: optional(&lookup, "BROWSER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                locale:     "en-US".to_string(),
                width:      1366,
                height:     768,
                command_timeout,
            },
        })
    }

    /// Hostname only, safe to log.
    pub fn webhook_host(&self) -> &str {
        self.webhook_url.host_str().unwrap_or("<none>")
    }
}

// ─── Lookup helpers ───────────────────────────────────────────────────────────

/// Present and non-blank, otherwise `None`.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value:  raw,
            reason: e.to_string(),
        }),
    }
}

fn flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value:  v.clone(),
                reason: "expected true/false".to_string(),
            }),
        },
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
