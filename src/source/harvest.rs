//! Link extraction from listing pages saved on disk

use crate::error::{Error, Result};
use crate::types::{FetchTarget, TargetBatch, TargetKey};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use super::{parse, TargetSource};

/// Enumerates previously saved listing pages (`*.html` files), one unit per
/// file, extracting document links from each.
///
/// Files are ordered by numeric stem where possible so `2.html` sorts before
/// `10.html`, keeping the resume cursor stable across runs.
pub struct LinkHarvestSource {
    listing_dir: PathBuf,
    link_selector: String,
    base_url: Option<Url>,
    files: Option<Vec<PathBuf>>,
}

impl LinkHarvestSource {
    /// Create a source over the saved pages in `listing_dir`.
    pub fn new(listing_dir: PathBuf, link_selector: String, base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::Config {
                message: format!("base_url is not a valid URL: {e}"),
                key: Some("source.base_url".to_string()),
            })?;
        Ok(Self {
            listing_dir,
            link_selector,
            base_url,
            files: None,
        })
    }

    async fn files(&mut self) -> Result<&[PathBuf]> {
        if self.files.is_none() {
            let mut files = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.listing_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "html") {
                    files.push(path);
                }
            }
            files.sort_by(|a, b| match (numeric_stem(a), numeric_stem(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(b),
            });
            debug!(
                dir = %self.listing_dir.display(),
                files = files.len(),
                "saved listing pages enumerated"
            );
            self.files = Some(files);
        }
        Ok(self.files.as_deref().unwrap_or_default())
    }
}

fn numeric_stem(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

#[async_trait]
impl TargetSource for LinkHarvestSource {
    async fn next_batch(&mut self, cursor: u64) -> Result<Option<TargetBatch>> {
        let link_selector = self.link_selector.clone();
        let base_url = self.base_url.clone();

        let files = self.files().await?;
        let Some(path) = files.get(cursor as usize).cloned() else {
            return Ok(None);
        };

        let html = tokio::fs::read_to_string(&path).await?;
        let links = parse::extract_item_links(&html, &link_selector, base_url.as_ref())?;
        if links.is_empty() {
            debug!(file = %path.display(), "saved page has no item links");
        }

        let targets = links
            .into_iter()
            .map(|url| FetchTarget {
                key: TargetKey::for_url(&url),
                url,
            })
            .collect();
        Ok(Some(TargetBatch {
            cursor: cursor + 1,
            targets,
        }))
    }

    fn expected_total(&self) -> Option<u64> {
        self.files.as_ref().map(|f| f.len() as u64)
    }
}
