//! Configuration types for corpus-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Where fetch targets come from.
///
/// Exactly one enumeration mode is active per run; the mode also determines
/// what the resume cursor counts (range chunks, listing pages, or saved
/// listing files).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Enumerate numeric document ids through a URL template
    Range {
        /// URL template containing an `{id}` placeholder
        url_template: String,

        /// First id, inclusive (default: 1)
        #[serde(default = "default_range_start")]
        start: u64,

        /// Last id, inclusive
        end: u64,

        /// Walk ids from `end` down to `start` (default: false)
        #[serde(default)]
        descending: bool,
    },

    /// Walk paginated listing pages and fetch the documents they link to
    Listing {
        /// Listing URL template containing a `{page}` placeholder
        url_template: String,

        /// Items advertised per listing page, used only to estimate the page
        /// count from the advertised total (default: 20)
        #[serde(default = "default_page_size")]
        page_size: u64,

        /// CSS selector for the element carrying the advertised result total
        #[serde(default = "default_total_selector")]
        total_selector: String,

        /// CSS selector for document links on a listing page
        #[serde(default = "default_link_selector")]
        link_selector: String,

        /// Base URL for resolving relative document links
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Extract document links from listing pages already saved on disk
    LinkHarvest {
        /// Directory holding previously saved listing pages (`*.html`)
        listing_dir: PathBuf,

        /// CSS selector for document links inside each saved page
        #[serde(default = "default_link_selector")]
        link_selector: String,

        /// Base URL for resolving relative document links
        #[serde(default)]
        base_url: Option<String>,
    },
}

/// Pipeline and storage behavior shared by every enumeration mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Directory artifacts are written to (default: "./artifacts")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Path of the resume checkpoint file (default: "./harvest-checkpoint.json")
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Number of concurrent fetch workers (default: 20)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Capacity of the bounded work queue (default: 40)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Ids per enumeration unit in range mode (default: 50)
    #[serde(default = "default_range_chunk_size")]
    pub range_chunk_size: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            checkpoint_path: default_checkpoint_path(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            queue_capacity: default_queue_capacity(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            range_chunk_size: default_range_chunk_size(),
        }
    }
}

/// What to do when a target fetch fails with a non-404 error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run on the first failed target (default)
    #[default]
    FailFast,
    /// Record the failure and keep draining remaining targets
    Isolate,
}

/// Main configuration for a harvest run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Target enumeration mode and its parameters
    pub source: SourceConfig,

    /// Pipeline and storage settings
    #[serde(flatten)]
    pub harvest: HarvestConfig,

    /// Failed-target handling (default: fail fast)
    #[serde(default)]
    pub on_fetch_error: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::Range {
                url_template: String::new(),
                start: 1,
                end: 0,
                descending: false,
            },
            harvest: HarvestConfig::default(),
            on_fetch_error: ErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Validate the configuration before a run starts.
    ///
    /// Rejects empty or placeholder-less URL templates, inverted ranges, zero
    /// concurrency/capacity values, and unparseable base URLs.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.max_concurrent_fetches == 0 {
            return Err(config_error(
                "max_concurrent_fetches must be at least 1",
                "max_concurrent_fetches",
            ));
        }
        if self.harvest.queue_capacity == 0 {
            return Err(config_error(
                "queue_capacity must be at least 1",
                "queue_capacity",
            ));
        }
        if self.harvest.range_chunk_size == 0 {
            return Err(config_error(
                "range_chunk_size must be at least 1",
                "range_chunk_size",
            ));
        }

        match &self.source {
            SourceConfig::Range {
                url_template,
                start,
                end,
                ..
            } => {
                if !url_template.contains("{id}") {
                    return Err(config_error(
                        "range url_template must contain an {id} placeholder",
                        "source.url_template",
                    ));
                }
                if end < start {
                    return Err(config_error(
                        "range end must not be less than start",
                        "source.end",
                    ));
                }
            }
            SourceConfig::Listing {
                url_template,
                page_size,
                base_url,
                ..
            } => {
                if !url_template.contains("{page}") {
                    return Err(config_error(
                        "listing url_template must contain a {page} placeholder",
                        "source.url_template",
                    ));
                }
                if *page_size == 0 {
                    return Err(config_error(
                        "page_size must be at least 1",
                        "source.page_size",
                    ));
                }
                validate_base_url(base_url.as_deref())?;
            }
            SourceConfig::LinkHarvest {
                listing_dir,
                base_url,
                ..
            } => {
                if listing_dir.as_os_str().is_empty() {
                    return Err(config_error(
                        "listing_dir must not be empty",
                        "source.listing_dir",
                    ));
                }
                validate_base_url(base_url.as_deref())?;
            }
        }

        Ok(())
    }
}

fn validate_base_url(base_url: Option<&str>) -> Result<()> {
    if let Some(raw) = base_url {
        Url::parse(raw).map_err(|e| Error::Config {
            message: format!("base_url is not a valid URL: {e}"),
            key: Some("source.base_url".to_string()),
        })?;
    }
    Ok(())
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_range_start() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

fn default_total_selector() -> String {
    ".results-count".to_string()
}

fn default_link_selector() -> String {
    "#results-list li a".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("./harvest-checkpoint.json")
}

fn default_max_concurrent_fetches() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    40
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("corpus-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_range_chunk_size() -> u64 {
    50
}

// Duration serialization helper (seconds as u64)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
