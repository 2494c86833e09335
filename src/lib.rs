//! # corpus-dl
//!
//! Resumable, bounded-concurrency bulk HTML document fetcher.
//!
//! ## Design Philosophy
//!
//! corpus-dl is designed to be:
//! - **Resumable** - a crash or Ctrl+C loses at most one enumeration unit
//! - **Idempotent** - artifacts on disk are the dedup index, reruns only fetch gaps
//! - **Bounded** - a fixed worker pool and a bounded queue cap memory and load
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use corpus_dl::{Config, Harvester, SourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         source: SourceConfig::Range {
//!             url_template: "https://docs.example.com/item/{id}".to_string(),
//!             start: 1,
//!             end: 10_000,
//!             descending: false,
//!         },
//!         ..Default::default()
//!     };
//!
//!     let harvester = Harvester::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = harvester.run().await?;
//!     println!("written: {}", report.summary.written);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Resume checkpoint persistence
pub mod checkpoint;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP fetching
pub mod fetch;
/// Harvest orchestration
pub mod harvester;
/// Progress counters
pub mod progress;
/// Target enumeration
pub mod source;
/// Artifact storage
pub mod store;
/// Core types and events
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::{Config, ErrorPolicy, HarvestConfig, SourceConfig};
pub use error::{Error, Result};
pub use fetch::{Fetch, FetchPayload, HttpFetcher};
pub use harvester::Harvester;
pub use progress::HarvestSummary;
pub use store::ArtifactStore;
pub use types::{Event, FetchTarget, HarvestReport, RunOutcome, TargetKey};

/// Helper function to run a harvest with graceful signal handling.
///
/// Spawns a signal listener that cancels the run on SIGTERM/SIGINT, then
/// drives the harvest to completion or interruption.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use corpus_dl::{Config, Harvester, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let harvester = Harvester::new(Config::default())?;
///     let report = run_with_shutdown(harvester).await?;
///     println!("{:?}", report.outcome);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(harvester: Harvester) -> Result<HarvestReport> {
    let cancel = harvester.cancel_token();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });

    let report = harvester.run().await;
    signal_task.abort();
    report
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
