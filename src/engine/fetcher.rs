//! # engine::fetcher
//!
//! **Tiered Fetcher**: builds the form for one account tier and POSTs it from
//! inside the bootstrapped session, dressed like the site's own XHR.
//! ยิง 1 request ต่อ 1 Tier ผ่าน page เดิมที่ผ่าน challenge แล้ว
//!
//! Returns the raw status and text; deciding what a non-200 means is the
//! normalizer's job.

use std::time::Duration;

use tracing::debug;

use crate::error::TierRejection;
use crate::models::{AccountTier, RequestForm};
use crate::session::{BrowserSession, FormRequest, RawResponse};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
pub const XHR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// Where a tier request goes and how long it may take.
#[derive(Debug, Clone, Copy)]
pub struct FetchTarget<'a> {
    pub api_url:  &'a str,
    pub referer:  &'a str,
    pub timeout:  Duration,
}

/// Build the outbound request for `tier`.
pub fn build_request(target: &FetchTarget<'_>, tier: &AccountTier, base: &RequestForm) -> FormRequest {
    let headers = [
        ("content-type", FORM_CONTENT_TYPE),
        ("x-requested-with", "XMLHttpRequest"),
        ("accept", XHR_ACCEPT),
        ("referer", target.referer),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect();

    FormRequest {
        url:     target.api_url.to_string(),
        referer: target.referer.to_string(),
        headers,
        body:    base.with_tier(tier).encode(),
    }
}

/// POST one tier's form through `session`.
///
/// A transport failure or timeout becomes a [`TierRejection::Transport`]; the
/// caller treats it like any other rejected tier.
pub async fn fetch_tier<S>(
    session: &mut S,
    target: &FetchTarget<'_>,
    tier: &AccountTier,
    base: &RequestForm,
) -> Result<RawResponse, TierRejection>
where
    S: BrowserSession + ?Sized,
{
    let request = build_request(target, tier, base);

    debug!(tier = %tier.label, body = %request.body, "POST {}", request.url);

    // timeout ของ Tier นี้เท่านั้น ไม่ลาม Tier อื่น
    match tokio::time::timeout(target.timeout, session.post_form(&request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(TierRejection::Transport { reason: e.to_string() }),
        Err(_) => Err(TierRejection::Transport {
            reason: format!("no response within {:?}", target.timeout),
        }),
    }
}
