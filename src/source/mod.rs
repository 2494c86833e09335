//! Target enumeration
//!
//! A [`TargetSource`] turns configuration into a lazy stream of
//! [`TargetBatch`]es, one batch per enumeration unit. Units are 1-based and
//! the cursor names the last unit already drained, so resuming is just
//! starting enumeration from the checkpointed cursor.

mod harvest;
mod listing;
pub mod parse;
mod range;

pub use harvest::LinkHarvestSource;
pub use listing::ListingSource;
pub use range::RangeSource;

use crate::config::{Config, SourceConfig};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::types::TargetBatch;
use async_trait::async_trait;
use std::sync::Arc;

/// Lazy producer of enumeration units.
#[async_trait]
pub trait TargetSource: Send {
    /// Produce the unit after `cursor` (so `next_batch(0)` yields unit 1).
    ///
    /// Returns `Ok(None)` when enumeration is exhausted. A returned batch may
    /// be empty; only `None` terminates the run.
    async fn next_batch(&mut self, cursor: u64) -> Result<Option<TargetBatch>>;

    /// Best-known total unit count, for progress estimation only.
    ///
    /// May be refined as enumeration proceeds and must never be used as a
    /// termination condition.
    fn expected_total(&self) -> Option<u64>;
}

/// Build the source matching the configured enumeration mode.
pub fn build_source(config: &Config, fetcher: Arc<dyn Fetch>) -> Result<Box<dyn TargetSource>> {
    match &config.source {
        SourceConfig::Range {
            url_template,
            start,
            end,
            descending,
        } => Ok(Box::new(RangeSource::new(
            url_template.clone(),
            *start,
            *end,
            *descending,
            config.harvest.range_chunk_size,
        ))),
        SourceConfig::Listing {
            url_template,
            page_size,
            total_selector,
            link_selector,
            base_url,
        } => Ok(Box::new(ListingSource::new(
            url_template.clone(),
            *page_size,
            total_selector.clone(),
            link_selector.clone(),
            base_url.as_deref(),
            fetcher,
        )?)),
        SourceConfig::LinkHarvest {
            listing_dir,
            link_selector,
            base_url,
        } => Ok(Box::new(LinkHarvestSource::new(
            listing_dir.clone(),
            link_selector.clone(),
            base_url.as_deref(),
        )?)),
    }
}
