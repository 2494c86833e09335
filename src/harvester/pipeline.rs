//! Producer/consumer pipeline
//!
//! One producer drains the [`TargetSource`] unit by unit into a bounded
//! queue; a fixed pool of workers fetches and stores targets. The producer
//! waits for each unit to fully drain before checkpointing it, so a
//! checkpointed cursor always means every target of that unit reached a
//! terminal outcome.

use crate::checkpoint::Checkpoint;
use crate::error::{Error, Result};
use crate::source::build_source;
use crate::types::{Event, FetchTarget, HarvestReport, RunOutcome, TargetBatch};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::worker::{run_worker, WorkerContext};
use super::Harvester;

/// Tracks how many targets of one enumeration unit are still in flight.
pub(super) struct UnitTracker {
    remaining: AtomicUsize,
    notify: Notify,
}

impl UnitTracker {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    /// Mark one target of the unit as terminally handled.
    pub fn complete(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Wait until every target of the unit is terminally handled.
    pub async fn drained(&self) {
        loop {
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            // Register before re-checking so a complete() between the load
            // and the await cannot be lost.
            let notified = self.notify.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One queue entry: a target plus the tracker of the unit it belongs to.
pub(super) struct QueueItem {
    pub target: FetchTarget,
    pub tracker: Arc<UnitTracker>,
}

pub(super) async fn run_pipeline(harvester: &Harvester) -> Result<HarvestReport> {
    harvester.store.ensure().await?;
    let mut source = build_source(&harvester.config, Arc::clone(&harvester.fetcher))?;

    let resume = harvester.checkpoints.load().await;
    let (mut cursor, mut completed, resumed_total) = match &resume {
        Some(cp) => {
            info!(
                cursor = cp.cursor,
                completed = cp.completed,
                "resuming from checkpoint"
            );
            (cp.cursor, cp.completed, cp.expected_total)
        }
        None => {
            info!("no checkpoint found, starting a fresh harvest");
            (0, 0, None)
        }
    };

    let (tx, rx) = mpsc::channel::<QueueItem>(harvester.config.harvest.queue_capacity);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));

    let workers: Vec<_> = (0..harvester.config.harvest.max_concurrent_fetches)
        .map(|_| {
            tokio::spawn(run_worker(WorkerContext {
                rx: Arc::clone(&rx),
                fetcher: Arc::clone(&harvester.fetcher),
                store: Arc::clone(&harvester.store),
                progress: Arc::clone(&harvester.progress),
                event_tx: harvester.event_tx.clone(),
                cancel: harvester.cancel.clone(),
                policy: harvester.config.on_fetch_error,
                first_error: Arc::clone(&first_error),
            }))
        })
        .collect();

    let outcome = produce_units(
        harvester,
        source.as_mut(),
        &tx,
        &first_error,
        resumed_total,
        &mut cursor,
        &mut completed,
    )
    .await;

    // Closing the queue lets idle workers exit their recv loop.
    drop(tx);
    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            warn!(error = %e, "fetch worker panicked");
        }
    }

    let enumeration_error = match outcome {
        Err(e) => Some(e),
        Ok(_) => None,
    };
    if let Some(e) = take_first_error(&first_error) {
        return Err(e);
    }
    if let Some(e) = enumeration_error {
        return Err(e);
    }

    let summary = harvester.progress.snapshot();
    if harvester.cancel.is_cancelled() {
        info!(cursor, completed, "harvest interrupted");
        harvester.emit(Event::Shutdown);
        Ok(HarvestReport {
            outcome: RunOutcome::Interrupted,
            summary,
        })
    } else {
        info!(cursor, completed, written = summary.written, "harvest completed");
        harvester.emit(Event::Completed {
            summary: summary.clone(),
        });
        Ok(HarvestReport {
            outcome: RunOutcome::Completed,
            summary,
        })
    }
}

/// Drain the source unit by unit. Returns `Ok(())` on exhaustion or
/// cancellation; enumeration failures propagate as errors.
///
/// A resumed listing run never refetches page 1 and so cannot rediscover the
/// advertised total; `resumed_total` carries the checkpointed estimate
/// forward until the source produces a fresher one.
async fn produce_units(
    harvester: &Harvester,
    source: &mut dyn crate::source::TargetSource,
    tx: &mpsc::Sender<QueueItem>,
    first_error: &Arc<Mutex<Option<Error>>>,
    resumed_total: Option<u64>,
    cursor: &mut u64,
    completed: &mut u64,
) -> Result<()> {
    loop {
        if harvester.cancel.is_cancelled() {
            return Ok(());
        }

        let batch = tokio::select! {
            _ = harvester.cancel.cancelled() => return Ok(()),
            batch = source.next_batch(*cursor) => batch,
        };
        let batch: TargetBatch = match batch {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(cursor = *cursor, "enumeration exhausted");
                return Ok(());
            }
            Err(e) => {
                harvester.emit(Event::EnumerationFailed {
                    cursor: *cursor + 1,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let unit_cursor = batch.cursor;
        let unit_size = batch.targets.len() as u64;

        // Pre-enqueue dedup keeps already-materialized targets from ever
        // occupying queue slots.
        let mut pending = Vec::with_capacity(batch.targets.len());
        for target in batch.targets {
            if harvester.store.contains(&target.key).await {
                harvester.progress.record_skipped_existing();
                harvester.emit(Event::SkippedExisting { key: target.key });
            } else {
                pending.push(target);
            }
        }

        let tracker = Arc::new(UnitTracker::new(pending.len()));
        for target in pending {
            let item = QueueItem {
                target,
                tracker: Arc::clone(&tracker),
            };
            tokio::select! {
                _ = harvester.cancel.cancelled() => return Ok(()),
                sent = tx.send(item) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                    harvester.progress.enqueued();
                }
            }
        }

        tokio::select! {
            _ = harvester.cancel.cancelled() => return Ok(()),
            _ = tracker.drained() => {}
        }

        // A fail-fast failure inside this unit must not be checkpointed over.
        if has_first_error(first_error) {
            return Ok(());
        }

        *cursor = unit_cursor;
        *completed += unit_size;
        let expected_total = source.expected_total().or(resumed_total);
        harvester
            .checkpoints
            .save(&Checkpoint {
                cursor: *cursor,
                expected_total,
                completed: *completed,
                updated_at: Utc::now(),
            })
            .await?;
        harvester.emit(Event::UnitCompleted {
            cursor: *cursor,
            expected_total,
            completed: *completed,
        });
    }
}

fn has_first_error(first_error: &Arc<Mutex<Option<Error>>>) -> bool {
    match first_error.lock() {
        Ok(slot) => slot.is_some(),
        Err(poisoned) => poisoned.into_inner().is_some(),
    }
}

fn take_first_error(first_error: &Arc<Mutex<Option<Error>>>) -> Option<Error> {
    match first_error.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
