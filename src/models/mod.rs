//! Domain models shared across the scrape pipeline.

pub mod record;
pub mod tier;

pub use record::{DeliveryEnvelope, NormalizedRecord};
pub use tier::{AccountTier, RequestForm};
