//! # models::tier
//!
//! [`AccountTier`] is the broker's account classification as the upstream API
//! encodes it (`type_account`).  [`RequestForm`] is the form body sent for one
//! tier: the fixed trading parameters plus that tier's code.

use url::form_urlencoded;

/// ประเภทบัญชี 1 แบบ. Immutable, defined at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTier {
    /// Upstream identifier, sent as `type_account`.
    pub code:  u8,
    /// Human-readable name, used in record keys.
    pub label: &'static str,
}

impl AccountTier {
    pub const fn new(code: u8, label: &'static str) -> Self {
        Self { code, label }
    }
}

/// Form fields for `POST /api/specification-param/`.
///
/// Field order on the wire is fixed: `symbol_group`, `currency`, `leverage`,
/// `lot`, then `type_account` once a tier has been merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestForm {
    pub symbol_group: String,
    pub currency:     String,
    pub leverage:     String,
    pub lot:          String,
    pub type_account: Option<u8>,
}

impl RequestForm {
    /// Forex majors, USD account, 1:2000, one standard lot.
    pub fn forex_default() -> Self {
        Self {
            symbol_group: "1".to_string(),
            currency:     "USD".to_string(),
            leverage:     "2000".to_string(),
            lot:          "1".to_string(),
            type_account: None,
        }
    }

    /// A copy of this form targeting `tier`.
    pub fn with_tier(&self, tier: &AccountTier) -> Self {
        Self {
            type_account: Some(tier.code),
            ..self.clone()
        }
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn encode(&self) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("symbol_group", &self.symbol_group)
            .append_pair("currency", &self.currency)
            .append_pair("leverage", &self.leverage)
            .append_pair("lot", &self.lot);
        if let Some(code) = self.type_account {
            body.append_pair("type_account", &code.to_string());
        }
        body.finish()
    }
}
