//! Core types and events for corpus-dl

use serde::{Deserialize, Serialize};

use crate::progress::HarvestSummary;

/// Stable identity of one crawlable document.
///
/// The artifact storage path is a pure function of this key, so the same
/// target always maps to the same location no matter when or how often it is
/// enumerated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TargetKey {
    /// Numeric identifier from a ranged enumeration
    Id(u64),
    /// MD5 fingerprint of a discovered URL (lowercase hex)
    Fingerprint(String),
}

impl TargetKey {
    /// Derive a fingerprint key from a discovered URL.
    pub fn for_url(url: &str) -> Self {
        Self::Fingerprint(format!("{:x}", md5::compute(url.as_bytes())))
    }

    /// Artifact file name derived from the key.
    ///
    /// Pure function: numeric keys map to `{id}.html`, fingerprint keys to
    /// `{md5hex}.html`.
    pub fn artifact_name(&self) -> String {
        match self {
            TargetKey::Id(id) => format!("{id}.html"),
            TargetKey::Fingerprint(hash) => format!("{hash}.html"),
        }
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKey::Id(id) => write!(f, "{id}"),
            TargetKey::Fingerprint(hash) => write!(f, "{hash}"),
        }
    }
}

/// One unit of crawlable work: a resolvable URL plus its stable key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTarget {
    /// The URL to fetch
    pub url: String,
    /// Stable key the artifact is stored under
    pub key: TargetKey,
}

/// The targets produced by one enumeration unit (one listing page, one range
/// chunk, or one on-disk listing file).
#[derive(Clone, Debug)]
pub struct TargetBatch {
    /// 1-based cursor of the unit that produced these targets
    pub cursor: u64,
    /// Targets discovered in this unit (may be empty)
    pub targets: Vec<FetchTarget>,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every enumeration unit was drained and checkpointed
    Completed,
    /// The run was cancelled; the checkpoint reflects the last drained unit
    Interrupted,
}

/// Final report of a harvest run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Whether the run completed or was interrupted
    pub outcome: RunOutcome,
    /// Counters accumulated during this run
    pub summary: HarvestSummary,
}

/// Event emitted during a harvest run.
///
/// Events are broadcast to all subscribers and double as the
/// error-observability sink: every fetch error and malformed-page condition
/// is emitted with enough context (URL, key, error text) to diagnose without
/// re-running.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An enumeration unit was fully drained and the checkpoint advanced
    UnitCompleted {
        /// Cursor of the drained unit
        cursor: u64,
        /// Best-known total unit count (progress estimate only)
        expected_total: Option<u64>,
        /// Cumulative terminal outcomes including skips
        completed: u64,
    },

    /// An artifact was fetched and written
    Written {
        /// Key of the written artifact
        key: TargetKey,
    },

    /// A target was skipped because its artifact already exists
    SkippedExisting {
        /// Key of the already-materialized artifact
        key: TargetKey,
    },

    /// A target returned HTTP 404 and was permanently skipped
    SkippedAbsent {
        /// Key of the absent target
        key: TargetKey,
        /// URL that returned 404
        url: String,
    },

    /// A target fetch failed (bad status or transport failure)
    FetchFailed {
        /// Key of the failing target
        key: TargetKey,
        /// URL of the failing target
        url: String,
        /// Error description
        error: String,
    },

    /// Enumeration itself failed (listing fetch or parse error)
    EnumerationFailed {
        /// Cursor at which enumeration failed
        cursor: u64,
        /// Error description
        error: String,
    },

    /// The run finished with every unit drained
    Completed {
        /// Final counters
        summary: HarvestSummary,
    },

    /// The run was cancelled
    Shutdown,
}
