//! Harvest orchestration
//!
//! [`Harvester`] owns the run: it validates configuration, builds the target
//! source, drives the bounded producer/consumer pipeline, and exposes
//! progress, events, and cancellation to embedders.

mod pipeline;
mod worker;

#[cfg(test)]
mod tests;

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetch, HttpFetcher};
use crate::progress::{HarvestSummary, ProgressCounters};
use crate::store::ArtifactStore;
use crate::types::{Event, HarvestReport};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The top-level handle for one harvest.
///
/// Cheap to share by reference; `run` takes `&self` so observers can hold the
/// handle while the run is in flight.
pub struct Harvester {
    pub(crate) config: Arc<Config>,
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) store: Arc<ArtifactStore>,
    pub(crate) checkpoints: Arc<CheckpointStore>,
    pub(crate) progress: Arc<ProgressCounters>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl Harvester {
    /// Create a harvester with a real HTTP fetcher.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.harvest)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a harvester with a caller-supplied [`Fetch`] implementation.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(ArtifactStore::new(&config.harvest.output_dir));
        let checkpoints = Arc::new(CheckpointStore::new(&config.harvest.checkpoint_path));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            store,
            checkpoints,
            progress: Arc::new(ProgressCounters::new()),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to run events. Slow subscribers lag; they never block the
    /// pipeline.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token observers can use to tie their own shutdown to the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a graceful stop: in-flight fetches finish, nothing new starts.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Snapshot of the run's progress counters.
    pub fn progress(&self) -> HarvestSummary {
        self.progress.snapshot()
    }

    /// Run the harvest to completion, interruption, or failure.
    pub async fn run(&self) -> Result<HarvestReport> {
        pipeline::run_pipeline(self).await
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
