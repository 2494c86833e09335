//! Ranged id enumeration

use crate::error::Result;
use crate::types::{FetchTarget, TargetBatch, TargetKey};
use async_trait::async_trait;

use super::TargetSource;

/// Enumerates numeric ids through a URL template, one fixed-size chunk per
/// unit. Supports descending walks for sources where recent ids matter most.
pub struct RangeSource {
    url_template: String,
    start: u64,
    end: u64,
    descending: bool,
    chunk_size: u64,
}

impl RangeSource {
    /// Create a source over the inclusive id range `start..=end`.
    pub fn new(url_template: String, start: u64, end: u64, descending: bool, chunk_size: u64) -> Self {
        Self {
            url_template,
            start,
            end,
            descending,
            chunk_size,
        }
    }

    fn count(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    fn target_for(&self, id: u64) -> FetchTarget {
        FetchTarget {
            url: self.url_template.replace("{id}", &id.to_string()),
            key: TargetKey::Id(id),
        }
    }
}

#[async_trait]
impl TargetSource for RangeSource {
    async fn next_batch(&mut self, cursor: u64) -> Result<Option<TargetBatch>> {
        let skipped = cursor * self.chunk_size;
        if skipped >= self.count() {
            return Ok(None);
        }
        let len = (self.count() - skipped).min(self.chunk_size);

        let targets: Vec<FetchTarget> = if self.descending {
            let first = self.end - skipped;
            (0..len).map(|i| self.target_for(first - i)).collect()
        } else {
            let first = self.start + skipped;
            (0..len).map(|i| self.target_for(first + i)).collect()
        };

        Ok(Some(TargetBatch {
            cursor: cursor + 1,
            targets,
        }))
    }

    fn expected_total(&self) -> Option<u64> {
        Some(self.count().div_ceil(self.chunk_size))
    }
}
