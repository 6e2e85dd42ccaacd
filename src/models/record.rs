//! # models::record
//!
//! [`NormalizedRecord`] is the unit of output: one instrument for one tier.
//! [`DeliveryEnvelope`] bundles every record of a run with the webhook token.
//!
//! `spread`, `swap_long` and `swap_short` are relayed exactly as the broker
//! sent them (number, numeric string, even `null`), so they stay
//! [`serde_json::Value`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::AccountTier;

/// 1 Symbol ของ 1 Tier: spread และ swap แบบแบน
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// `"<tier label>||<symbol>"`, unique within a run.
    pub key:          String,
    #[serde(with = "iso_millis")]
    pub fetched_at:   DateTime<Utc>,
    pub account_type: String,
    pub symbol:       String,
    pub spread:       Value,
    pub swap_long:    Value,
    pub swap_short:   Value,
    /// Endpoint and tier code the record came from.
    pub source:       String,
}

impl NormalizedRecord {
    pub fn record_key(tier: &AccountTier, symbol: &str) -> String {
        format!("{}||{}", tier.label, symbol)
    }

    pub fn source_for(api_url: &str, tier: &AccountTier) -> String {
        format!("{} (type_account={})", api_url, tier.code)
    }
}

/// The single JSON payload posted to the webhook.
///
/// The token rides in the body so the n8n workflow can read it as
/// `$json.token`.
#[derive(Debug, Serialize)]
pub struct DeliveryEnvelope {
    pub token:      String,
    #[serde(with = "iso_millis")]
    pub fetched_at: DateTime<Utc>,
    pub records:    Vec<NormalizedRecord>,
}

/// RFC 3339, UTC, millisecond precision, `Z` suffix.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let tier = AccountTier::new(1, "Classic");
        let fetched_at = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        let record = NormalizedRecord {
            key:          NormalizedRecord::record_key(&tier, "EURUSD"),
            fetched_at,
            account_type: tier.label.to_string(),
            symbol:       "EURUSD".to_string(),
            spread:       json!(1.2),
            swap_long:    json!(-0.5),
            swap_short:   json!("0.1"),
            source:       NormalizedRecord::source_for("https://api.test/spec/", &tier),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "key":          "Classic||EURUSD",
                "fetched_at":   "2026-10-17T08:00:00.000Z",
                "account_type": "Classic",
                "symbol":       "EURUSD",
                "spread":       1.2,
                "swap_long":    -0.5,
                "swap_short":   "0.1",
                "source":       "https://api.test/spec/ (type_account=1)",
            })
        );
    }

    #[test]
    fn test_envelope_shape() {
        let fetched_at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let envelope = DeliveryEnvelope {
            token: "t0k".to_string(),
            fetched_at,
            records: Vec::new(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({ "token": "t0k", "fetched_at": "2026-01-02T03:04:05.000Z", "records": [] })
        );
    }
}
