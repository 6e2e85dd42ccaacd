//! # forex-spec-relay: Forex Specification Scraper
//!
//! Collects spread and swap rates for every forex symbol, per account tier,
//! and relays them to an n8n webhook in one envelope.
//!
//! ```text
//!  ┌──────────────┐  GET spec page (challenge)   ┌────────────────────┐
//!  │  Chromium    │ ────────────────────────────▶ │  Broker website    │
//!  │  (headless)  │  POST /api/specification-    │                    │
//!  │              │  param × 3 tiers (in-page)   │                    │
//!  └──────┬───────┘ ◀──────────────────────────── └────────────────────┘
//!         │ RawResponse
//!         ▼
//!  ┌──────────────┐  normalize   ┌──────────────┐  POST envelope  ┌───────┐
//!  │  Fetcher     │ ───────────▶ │  Records     │ ──────────────▶ │  n8n  │
//!  └──────────────┘              └──────────────┘                 └───────┘
//! ```
//!
//! Runs once and exits: `0` after a successful delivery, `1` on any fatal
//! error.  See [`config`] for environment variables.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod delivery;
mod engine;
mod error;
mod models;
mod pipeline;
mod session;

use config::Config;
use models::record::iso_millis;
use pipeline::{RunSummary, TierOutcome};
use session::ChromiumSession;

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // ── 1. Load .env (optional, CI can use real env vars) ───────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ────────────────────────────────────────────────
    if let Err(e) = init_tracing() {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(r#"

  ╔═══════════════════════════════════════════════╗
  ║     FOREX SPEC RELAY · Spread & Swap Scraper  ║
  ║     Chromium · 3 account tiers · n8n          ║
  ╚═══════════════════════════════════════════════╝"#);

    match run().await {
        Ok(summary) => {
            report(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "❌ Run failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("forex_spec_relay=debug".parse()?)
            .add_directive("chromiumoxide=warn".parse()?)
            .add_directive("reqwest=warn".parse()?))
        .init();
    Ok(())
}

async fn run() -> anyhow::Result<RunSummary> {
    // ── 3. Config, stamp, browser, pipeline (config fails before launch) ────
    let client = reqwest::Client::new();
    let summary = pipeline::launch_and_run(
        Config::from_env,
        |profile| async move { ChromiumSession::launch(&profile).await },
        &client,
    )
    .await
    .context("Run aborted")?;

    Ok(summary)
}

fn report(summary: &RunSummary) {
    for tier in &summary.tiers {
        match &tier.outcome {
            TierOutcome::Added(added) => info!(tier = %tier.label, added, "tier ok"),
            TierOutcome::Rejected(reason) => info!(tier = %tier.label, reason = %reason, "tier rejected"),
        }
    }
    info!(
        fetched_at = %iso_millis::format(&summary.fetched_at),
        records    = summary.records(),
        "🏁 Run complete"
    );
}
