//! # pipeline: 1 รอบการทำงาน ตั้งแต่ config จนส่ง webhook
//!
//! One complete run, strictly sequential:
//!
//! ```text
//! bootstrap ─▶ Classic ─▶ Market Pro ─▶ ECN ─▶ close browser ─▶ deliver
//!                 │            │          │
//!                 └── normalize, append ──┘
//! ```
//!
//! Tiers share the one browser page, so they are never fetched concurrently.
//! A rejected tier adds zero records and the loop moves on; a bootstrap or
//! delivery failure aborts the run.  The browser is closed on every path once
//! it has been handed to [`run`].

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{BrowserProfile, Config};
use crate::delivery::{deliver, DeliveryReceipt};
use crate::engine::fetcher::{fetch_tier, FetchTarget};
use crate::engine::normalizer::normalize;
use crate::error::{ConfigError, RunError, SessionError, TierRejection};
use crate::models::{AccountTier, DeliveryEnvelope, NormalizedRecord};
use crate::session::{bootstrap, BrowserSession};

/// How one tier went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    Added(usize),
    Rejected(TierRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierReport {
    pub label:   &'static str,
    pub outcome: TierOutcome,
}

#[derive(Debug)]
pub struct RunSummary {
    pub fetched_at: DateTime<Utc>,
    pub tiers:      Vec<TierReport>,
    pub receipt:    DeliveryReceipt,
}

impl RunSummary {
    pub fn records(&self) -> usize {
        self.receipt.delivered
    }
}

/// Load config, stamp the run, launch the browser, then [`run`].
///
/// `load` runs first: a config error returns before `launch` is called, so
/// nothing touches the network.
pub async fn launch_and_run<C, L, Fut, S>(
    load: C,
    launch: L,
    client: &reqwest::Client,
) -> Result<RunSummary, RunError>
where
    C: FnOnce() -> Result<Config, ConfigError>,
    L: FnOnce(BrowserProfile) -> Fut,
    Fut: Future<Output = Result<S, SessionError>>,
    S: BrowserSession,
{
    let config = load()?;

    info!(
        webhook_host  = %config.webhook_host(),
        spec_page     = %config.spec_page_url,
        tiers         = config.tiers.len(),
        fetch_timeout = ?config.fetch_timeout,
        "Config loaded"
    );

    // ก่อนเปิด browser: ทุก record ใน run นี้ใช้ timestamp เดียวกัน
    let fetched_at = Utc::now();

    let mut session = launch(config.browser.clone()).await?;
    run(&config, &mut session, client, fetched_at).await
}

/// Execute one run against an already-launched `session`.
///
/// `fetched_at` is the run's single timestamp, taken before the browser was
/// started.
pub async fn run<S>(
    config: &Config,
    session: &mut S,
    client: &reqwest::Client,
    fetched_at: DateTime<Utc>,
) -> Result<RunSummary, RunError>
where
    S: BrowserSession + ?Sized,
{
    let collected = match bootstrap(session, &config.spec_page_url, config.nav_timeout, config.settle_delay).await {
        Ok(()) => Ok(collect_records(session, config, fetched_at).await),
        Err(e) => Err(e),
    };

    release(session).await;
    let (records, tiers) = collected?;

    info!(records = records.len(), "Records collected");

    let envelope = DeliveryEnvelope {
        token: config.webhook_token.clone(),
        fetched_at,
        records,
    };
    let receipt = deliver(client, &config.webhook_url, &envelope, config.webhook_timeout).await?;

    Ok(RunSummary {
        fetched_at,
        tiers,
        receipt,
    })
}

/// Fetch and normalize every configured tier, in order.
pub async fn collect_records<S>(
    session: &mut S,
    config: &Config,
    fetched_at: DateTime<Utc>,
) -> (Vec<NormalizedRecord>, Vec<TierReport>)
where
    S: BrowserSession + ?Sized,
{
    let target = FetchTarget {
        api_url: &config.api_url,
        referer: &config.spec_page_url,
        timeout: config.fetch_timeout,
    };

    let mut records = Vec::new();
    let mut reports = Vec::with_capacity(config.tiers.len());

    for tier in &config.tiers {
        let outcome = match scrape_tier(session, &target, tier, config, fetched_at).await {
            Ok(batch) => {
                info!(tier = %tier.label, added = batch.len(), "📈 Tier collected");
                let added = batch.len();
                records.extend(batch);
                TierOutcome::Added(added)
            }
            Err(rejection) => {
                warn!(tier = %tier.label, code = tier.code, "⚠️ Tier skipped: {rejection}");
                TierOutcome::Rejected(rejection)
            }
        };
        reports.push(TierReport { label: tier.label, outcome });
    }

    (records, reports)
}

async fn scrape_tier<S>(
    session: &mut S,
    target: &FetchTarget<'_>,
    tier: &AccountTier,
    config: &Config,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedRecord>, TierRejection>
where
    S: BrowserSession + ?Sized,
{
    let response = fetch_tier(session, target, tier, &config.base_form).await?;
    normalize(&response, tier, fetched_at, &config.api_url)
}

/// Close the browser; a failure here never masks the run's own outcome.
async fn release<S>(session: &mut S)
where
    S: BrowserSession + ?Sized,
{
    if let Err(e) = session.close().await {
        warn!(error = %e, "Browser did not close cleanly");
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
