//! # engine::normalizer
//!
//! **Response Normalizer**: turns one tier's raw response into flat records.
//! ตรวจ response ของ 1 Tier แล้วแปลงเป็น record แบนๆ หรือ reject ทั้ง Tier
//!
//! ## Decision sequence
//!
//! ```text
//! RawResponse
//!     │
//!     ├─ [1] status != 200          → reject tier
//!     ├─ [2] body starts with '<'   → reject tier (HTML challenge / error page)
//!     ├─ [3] body is not JSON       → reject tier
//!     ├─ [4] JSON is not an object  → reject tier
//!     │
//!     └─ for each (symbol, entry), in upstream key order:
//!            entry not an object              → skip
//!            spread / swap_long / swap_short
//!              missing (null still counts)    → skip
//!            otherwise                        → NormalizedRecord
//! ```
//!
//! Tier-level rejections come back as [`TierRejection`]; entry-level skips are
//! silent apart from a debug count.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{excerpt, TierRejection, TIER_EXCERPT_CHARS};
use crate::models::{AccountTier, NormalizedRecord};
use crate::session::RawResponse;

/// Fields every accepted entry must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["spread", "swap_long", "swap_short"];

/// A symbol entry that passed validation.
#[derive(Debug, PartialEq)]
pub struct SpecEntry<'a> {
    pub spread:     &'a Value,
    pub swap_long:  &'a Value,
    pub swap_short: &'a Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRejection {
    NotAnObject,
    MissingField(&'static str),
}

/// Per-symbol validation outcome.
#[derive(Debug, PartialEq)]
pub enum EntryShape<'a> {
    Valid(SpecEntry<'a>),
    Rejected(EntryRejection),
}

/// Validate one symbol's value.  Presence is what matters: `0`, `""` and
/// `null` are all kept.
pub fn classify_entry(value: &Value) -> EntryShape<'_> {
    let Some(fields) = value.as_object() else {
        return EntryShape::Rejected(EntryRejection::NotAnObject);
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|name| !fields.contains_key(**name)) {
        return EntryShape::Rejected(EntryRejection::MissingField(*missing));
    }

    EntryShape::Valid(SpecEntry {
        spread:     &fields["spread"],
        swap_long:  &fields["swap_long"],
        swap_short: &fields["swap_short"],
    })
}

/// Steps 1–4: decide whether the tier's body is usable at all.
pub fn parse_response(response: &RawResponse) -> Result<Map<String, Value>, TierRejection> {
    let snippet = || excerpt(&response.body, TIER_EXCERPT_CHARS);

    if response.status != 200 {
        return Err(TierRejection::Status {
            status:  response.status,
            excerpt: snippet(),
        });
    }

    if response.body.trim_start().starts_with('<') {
        return Err(TierRejection::HtmlChallenge { excerpt: snippet() });
    }

    let parsed: Value = serde_json::from_str(&response.body).map_err(|e| TierRejection::InvalidJson {
        reason:  e.to_string(),
        excerpt: snippet(),
    })?;

    match parsed {
        Value::Object(entries) => Ok(entries),
        _ => Err(TierRejection::NotAnObject { excerpt: snippet() }),
    }
}

/// Normalize one tier's response into records stamped with `fetched_at`.
pub fn normalize(
    response: &RawResponse,
    tier: &AccountTier,
    fetched_at: DateTime<Utc>,
    api_url: &str,
) -> Result<Vec<NormalizedRecord>, TierRejection> {
    let entries = parse_response(response)?;
    let source = NormalizedRecord::source_for(api_url, tier);

    let mut skipped = 0usize;
    let records: Vec<NormalizedRecord> = entries
        .iter()
        .filter_map(|(symbol, value)| match classify_entry(value) {
            EntryShape::Valid(entry) => Some(NormalizedRecord {
                key:          NormalizedRecord::record_key(tier, symbol),
                fetched_at,
                account_type: tier.label.to_string(),
                symbol:       symbol.clone(),
                spread:       entry.spread.clone(),
                swap_long:    entry.swap_long.clone(),
                swap_short:   entry.swap_short.clone(),
                source:       source.clone(),
            }),
            EntryShape::Rejected(_) => {
                skipped += 1;
                None
            }
        })
        .collect();

    debug!(tier = %tier.label, accepted = records.len(), skipped, "Tier response normalized");

    Ok(records)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const API: &str = "https://broker.test/api/specification-param/";

    fn classic() -> AccountTier {
        AccountTier::new(1, "Classic")
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 6, 30, 0).unwrap()
    }

    fn ok(body: &str) -> RawResponse {
        RawResponse { status: 200, body: body.to_string() }
    }

    #[test]
    fn test_classic_scenario_keeps_complete_entry_only() {
        let body = r#"{"EURUSD": {"spread": 1.2, "swap_long": -0.5, "swap_short": 0.1}, "XAUUSD": {"spread": 3.0}}"#;

        let records = normalize(&ok(body), &classic(), stamp(), API).unwrap();

        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.key, "Classic||EURUSD");
        assert_eq!(rec.account_type, "Classic");
        assert_eq!(rec.symbol, "EURUSD");
        assert_eq!(rec.spread, json!(1.2));
        assert_eq!(rec.swap_long, json!(-0.5));
        assert_eq!(rec.swap_short, json!(0.1));
        assert_eq!(rec.source, format!("{API} (type_account=1)"));
        assert_eq!(rec.fetched_at, stamp());
    }

    #[test]
    fn test_falsy_values_are_present() {
        let body = r#"{
            "ZERO":  {"spread": 0,  "swap_long": 0,    "swap_short": 0},
            "EMPTY": {"spread": "", "swap_long": "",   "swap_short": ""},
            "NULL":  {"spread": null, "swap_long": null, "swap_short": null}
        }"#;

        let records = normalize(&ok(body), &classic(), stamp(), API).unwrap();

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["ZERO", "EMPTY", "NULL"]);
        assert_eq!(records[0].spread, json!(0));
        assert_eq!(records[1].swap_long, json!(""));
        assert_eq!(records[2].swap_short, Value::Null);
    }

    #[test]
    fn test_each_missing_field_is_rejected() {
        for missing in REQUIRED_FIELDS {
            let mut entry = json!({"spread": 1, "swap_long": 2, "swap_short": 3});
            entry.as_object_mut().unwrap().remove(missing);

            assert_eq!(
                classify_entry(&entry),
                EntryShape::Rejected(EntryRejection::MissingField(missing))
            );
        }
    }

    #[test]
    fn test_non_object_entries_skipped() {
        let body = r#"{"META": "v2", "LIST": [1, 2], "NUM": 7, "GBPUSD": {"spread": 1, "swap_long": 2, "swap_short": 3}}"#;

        let records = normalize(&ok(body), &classic(), stamp(), API).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "GBPUSD");
        assert_eq!(classify_entry(&json!("v2")), EntryShape::Rejected(EntryRejection::NotAnObject));
    }

    #[test]
    fn test_upstream_key_order_preserved() {
        let body = r#"{
            "USDJPY": {"spread": 1, "swap_long": 1, "swap_short": 1},
            "AUDCAD": {"spread": 1, "swap_long": 1, "swap_short": 1},
            "EURUSD": {"spread": 1, "swap_long": 1, "swap_short": 1}
        }"#;

        let records = normalize(&ok(body), &classic(), stamp(), API).unwrap();

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["USDJPY", "AUDCAD", "EURUSD"]);
    }

    #[test]
    fn test_duplicate_symbol_emitted_once() {
        let body = r#"{
            "EURUSD": {"spread": 1, "swap_long": 1, "swap_short": 1},
            "EURUSD": {"spread": 2, "swap_long": 2, "swap_short": 2}
        }"#;

        let records = normalize(&ok(body), &classic(), stamp(), API).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "Classic||EURUSD");
    }

    #[test]
    fn test_non_200_rejected_with_excerpt() {
        let response = RawResponse { status: 403, body: "x".repeat(1000) };

        let err = normalize(&response, &classic(), stamp(), API).unwrap_err();

        match err {
            TierRejection::Status { status, excerpt } => {
                assert_eq!(status, 403);
                assert_eq!(excerpt.len(), TIER_EXCERPT_CHARS);
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn test_html_challenge_rejected() {
        let response = ok("  \n<!DOCTYPE html><html><title>Just a moment...</title></html>");

        let err = normalize(&response, &classic(), stamp(), API).unwrap_err();

        assert!(matches!(err, TierRejection::HtmlChallenge { .. }));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = normalize(&ok("{\"EURUSD\": "), &classic(), stamp(), API).unwrap_err();
        assert!(matches!(err, TierRejection::InvalidJson { .. }));
    }

    #[test]
    fn test_top_level_array_rejected() {
        let err = normalize(&ok("[1, 2, 3]"), &classic(), stamp(), API).unwrap_err();
        assert!(matches!(err, TierRejection::NotAnObject { .. }));
    }

    #[test]
    fn test_empty_object_yields_no_records() {
        let records = normalize(&ok("{}"), &classic(), stamp(), API).unwrap();
        assert!(records.is_empty());
    }
}
