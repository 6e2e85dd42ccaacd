//! # delivery: POST envelope ของทั้งรอบไปยัง n8n webhook
//!
//! ส่งครั้งเดียวทั้งก้อน ไม่มีการส่งบางส่วน
//! Log เฉพาะ hostname ของ webhook ห้าม log path หรือ token

use std::time::Duration;

use reqwest::Url;
use tracing::info;

use crate::error::{excerpt, DeliveryError, DELIVERY_EXCERPT_CHARS};
use crate::models::DeliveryEnvelope;

const ACK_EXCERPT_CHARS: usize = 200;

/// What the webhook said when it accepted the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status:    u16,
    pub delivered: usize,
    /// Start of the webhook's response body.
    pub response:  String,
}

/// POST the whole envelope in one request.  Any non-2xx is fatal.
pub async fn deliver(
    client: &reqwest::Client,
    webhook_url: &Url,
    envelope: &DeliveryEnvelope,
    timeout: Duration,
) -> Result<DeliveryReceipt, DeliveryError> {
    info!(
        host    = webhook_url.host_str().unwrap_or("<none>"),
        records = envelope.records.len(),
        "📤 Delivering envelope to webhook..."
    );

    let resp = client
        .post(webhook_url.clone())
        .json(envelope)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| DeliveryError::Transport(e.without_url()))?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(DeliveryError::Rejected {
            status:  status.as_u16(),
            excerpt: excerpt(&body, DELIVERY_EXCERPT_CHARS),
        });
    }

    let receipt = DeliveryReceipt {
        status:    status.as_u16(),
        delivered: envelope.records.len(),
        response:  excerpt(&body, ACK_EXCERPT_CHARS),
    };

    info!(
        status   = receipt.status,
        response = %receipt.response,
        "OK: sent {} records to n8n ✅", receipt.delivered
    );

    Ok(receipt)
}
