//! Fetch-and-normalize stages of the pipeline.
//!
//! - `fetcher`: one form POST per account tier, through the browser session
//! - `normalizer`: validates and flattens a tier's raw response into records

pub mod fetcher;
pub mod normalizer;
