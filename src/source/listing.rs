//! Paginated listing enumeration

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchPayload};
use crate::types::{FetchTarget, TargetBatch, TargetKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::{parse, TargetSource};

/// Walks paginated listing pages one unit per page, extracting document links
/// with the configured selector.
///
/// The advertised result total is read from page 1 and converted to a page
/// count estimate; enumeration terminates only on a 404 page or a page with
/// zero item links, never on the estimate.
pub struct ListingSource {
    url_template: String,
    page_size: u64,
    total_selector: String,
    link_selector: String,
    base_url: Option<Url>,
    fetcher: Arc<dyn Fetch>,
    discovered_total: Option<u64>,
}

impl ListingSource {
    /// Create a source over the listing template.
    pub fn new(
        url_template: String,
        page_size: u64,
        total_selector: String,
        link_selector: String,
        base_url: Option<&str>,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<Self> {
        let base_url = base_url
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::Config {
                message: format!("base_url is not a valid URL: {e}"),
                key: Some("source.base_url".to_string()),
            })?;
        Ok(Self {
            url_template,
            page_size,
            total_selector,
            link_selector,
            base_url,
            fetcher,
            discovered_total: None,
        })
    }

    fn page_url(&self, page: u64) -> String {
        self.url_template.replace("{page}", &page.to_string())
    }
}

#[async_trait]
impl TargetSource for ListingSource {
    async fn next_batch(&mut self, cursor: u64) -> Result<Option<TargetBatch>> {
        let page = cursor + 1;
        let url = self.page_url(page);

        let body = match self.fetcher.fetch(&url).await? {
            FetchPayload::Body(body) => body,
            FetchPayload::NotFound => {
                debug!(page, url = %url, "listing page absent, enumeration exhausted");
                return Ok(None);
            }
        };
        let html = String::from_utf8_lossy(&body);

        if page == 1 {
            match parse::extract_total(&html, &self.total_selector) {
                Ok(Some(total)) => {
                    self.discovered_total = Some(total.div_ceil(self.page_size).max(1));
                    debug!(
                        advertised_items = total,
                        estimated_pages = self.discovered_total,
                        "listing advertises a result total"
                    );
                }
                Ok(None) => {
                    warn!(url = %url, "listing total not readable, walking pages without an estimate");
                }
                Err(e) => return Err(e),
            }
        }

        let links = parse::extract_item_links(&html, &self.link_selector, self.base_url.as_ref())?;
        if links.is_empty() {
            if page == 1 {
                return Err(Error::MalformedListing {
                    page: url,
                    message: format!("no item links matched selector {:?}", self.link_selector),
                });
            }
            debug!(page, "listing page has no items, enumeration exhausted");
            return Ok(None);
        }

        let targets = links
            .into_iter()
            .map(|url| FetchTarget {
                key: TargetKey::for_url(&url),
                url,
            })
            .collect();
        Ok(Some(TargetBatch {
            cursor: page,
            targets,
        }))
    }

    fn expected_total(&self) -> Option<u64> {
        self.discovered_total
    }
}
