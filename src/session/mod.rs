//! # session
//!
//! The browser capability the pipeline depends on.
//! เปิดหน้า specification ให้ผ่าน bot challenge ก่อน แล้วค่อยยิง API จากในหน้านั้น
//!
//! The broker's API sits behind a bot-mitigation layer that only accepts
//! requests carrying the cookies a real rendered page earns.  So every API
//! call goes through a [`BrowserSession`]: first [`bootstrap`] loads the
//! specification page and lets the challenge settle, then each tier request
//! is issued from inside that same page.
//!
//! ```text
//!  bootstrap(page_url)          post_form(api_url) × tiers
//!  ──────────────────▶  cookies ─────────────────────────▶ RawResponse
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SessionError;

pub mod chromium;

pub use chromium::ChromiumSession;

/// An outbound form POST issued from within the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub url:     String,
    /// Page the request claims to come from.
    pub referer: String,
    pub headers: Vec<(String, String)>,
    /// Already form-encoded.
    pub body:    String,
}

/// Status and raw text of a response.  Non-2xx is not an error here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body:   String,
}

/// A browsing context with a shared cookie jar.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, returning once the DOM content has loaded.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// POST a form from within the current page.
    async fn post_form(&mut self, request: &FormRequest) -> Result<RawResponse, SessionError>;

    /// Release the browser.  Called exactly once, on every exit path.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Navigate to the specification page, then hold for `settle` so any
/// challenge script can finish setting its cookies.
pub async fn bootstrap<S>(
    session: &mut S,
    page_url: &str,
    nav_timeout: Duration,
    settle: Duration,
) -> Result<(), SessionError>
where
    S: BrowserSession + ?Sized,
{
    info!(url = %page_url, "🌐 Opening specification page...");
    session.navigate(page_url, nav_timeout).await?;

    debug!(settle = ?settle, "Waiting for challenge scripts to settle");
    tokio::time::sleep(settle).await;

    info!("✅ Browser session ready");
    Ok(())
}
