//! # session::chromium
//!
//! [`BrowserSession`] backed by headless Chromium over the DevTools protocol.
//! Chromium จริงผ่าน CDP: cookie และ fingerprint ตรงกับหน้าที่แก้ challenge
//!
//! Form posts run as an in-page `fetch()`, so the request carries exactly the
//! cookies, origin and TLS fingerprint of the page that solved the challenge.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::EventDomContentEventFired;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BrowserProfile;
use crate::error::SessionError;
use crate::session::{BrowserSession, FormRequest, RawResponse};

pub struct ChromiumSession {
    browser: Browser,
    page:    Page,
    handler: JoinHandle<()>,
}

/// What the in-page script hands back.
#[derive(Debug, Deserialize)]
struct FetchOutcome {
    status: u16,
    body:   String,
}

impl ChromiumSession {
    /// Start Chromium with a desktop identity and open a blank page.
    pub async fn launch(profile: &BrowserProfile) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder()
            .window_size(profile.width, profile.height)
            .viewport(Viewport {
                width: profile.width,
                height: profile.height,
                ..Default::default()
            })
            .request_timeout(profile.command_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--lang={}", profile.locale));
        if !profile.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // The CDP handler must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };

        let mut session = Self { browser, page, handler };
        if let Err(e) = session.apply_identity(profile).await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn apply_identity(&self, profile: &BrowserProfile) -> Result<(), SessionError> {
        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(profile.user_agent.clone())
            .accept_language(profile.locale.clone())
            .build()
            .map_err(SessionError::Launch)?;
        self.page.set_user_agent(identity).await?;
        Ok(())
    }

    /// Starts the navigation from a page script and waits for
    /// `DOMContentLoaded`.
    ///
    /// `Page.navigate` is avoided: the CDP handler holds that command open
    /// until the frame's `load` event, i.e. full resource completion.
    async fn navigate_until_dom_loaded(&self, url: &str) -> Result<(), SessionError> {
        let mut dom_loaded = self.page.event_listener::<EventDomContentEventFired>().await?;

        let params = EvaluateParams::builder()
            .expression(navigate_script(url)?)
            .build()
            .map_err(SessionError::Script)?;
        self.page.evaluate_expression(params).await?;

        match dom_loaded.next().await {
            Some(_) => Ok(()),
            None => Err(SessionError::Navigation {
                url:    url.to_string(),
                reason: "page closed before DOMContentLoaded".to_string(),
            }),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        match tokio::time::timeout(timeout, self.navigate_until_dom_loaded(url)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::NavigationTimeout {
                url:        url.to_string(),
                timeout_ms: timeout.as_millis(),
            }),
        }
    }

    async fn post_form(&mut self, request: &FormRequest) -> Result<RawResponse, SessionError> {
        let script = fetch_script(request)?;
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(SessionError::Script)?;

        let outcome: FetchOutcome = self
            .page
            .evaluate_expression(params)
            .await?
            .into_value()
            .map_err(|e| SessionError::Script(e.to_string()))?;

        Ok(RawResponse {
            status: outcome.status,
            body:   outcome.body,
        })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Chromium process did not exit cleanly");
        }
        self.handler.abort();
        closed?;
        Ok(())
    }
}

/// Builds the async IIFE that performs the POST inside the page.
///
/// Every value is embedded as a JSON literal.  `referer` is a forbidden
/// header for `fetch()`, so it goes in as the `referrer` option.
fn fetch_script(request: &FormRequest) -> Result<String, SessionError> {
    let headers: serde_json::Map<String, serde_json::Value> = request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("referer"))
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
        .collect();

    Ok(format!(
        r#"(async () => {{
  const r = await fetch({url}, {{
    method: "POST",
    credentials: "include",
    referrer: {referrer},
    headers: {headers},
    body: {body}
  }});
  return {{ status: r.status, body: await r.text() }};
}})()"#,
        url = js_literal(&request.url)?,
        referrer = js_literal(&request.referer)?,
        headers = js_literal(&headers)?,
        body = js_literal(&request.body)?,
    ))
}

/// Defers `location.assign` so the evaluation returns before the old document
/// is torn down.
fn navigate_script(url: &str) -> Result<String, SessionError> {
    Ok(format!("setTimeout(() => location.assign({}), 0)", js_literal(url)?))
}

fn js_literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, SessionError> {
    serde_json::to_string(value).map_err(|e| SessionError::Script(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FormRequest {
        FormRequest {
            url:     "https://broker.test/api/spec/".to_string(),
            referer: "https://broker.test/spec-page/".to_string(),
            headers: vec![
                ("x-requested-with".to_string(), "XMLHttpRequest".to_string()),
                ("referer".to_string(), "https://broker.test/spec-page/".to_string()),
            ],
            body:    "symbol_group=1&type_account=1".to_string(),
        }
    }

    #[test]
    fn test_navigate_script_defers_location_assign() {
        let script = navigate_script("https://broker.test/spec-page/?a=\"b\"").unwrap();
        assert_eq!(
            script,
            r#"setTimeout(() => location.assign("https://broker.test/spec-page/?a=\"b\""), 0)"#
        );
    }

    #[test]
    fn test_fetch_script_embeds_json_literals() {
        let script = fetch_script(&request()).unwrap();

        assert!(script.contains(r#"fetch("https://broker.test/api/spec/""#));
        assert!(script.contains(r#"referrer: "https://broker.test/spec-page/""#));
        assert!(script.contains(r#"body: "symbol_group=1&type_account=1""#));
        assert!(script.contains(r#""x-requested-with":"XMLHttpRequest""#));
    }

    #[test]
    fn test_fetch_script_moves_referer_out_of_headers() {
        let script = fetch_script(&request()).unwrap();
        assert!(!script.contains(r#""referer":"#));
    }

    #[test]
    fn test_fetch_script_escapes_quotes() {
        let mut req = request();
        req.body = r#"a"b</script>"#.to_string();
        let script = fetch_script(&req).unwrap();
        assert!(script.contains(r#"body: "a\"b</script>""#));
    }
}
