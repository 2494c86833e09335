//! Fetch worker loop

use crate::config::ErrorPolicy;
use crate::error::Error;
use crate::fetch::{Fetch, FetchPayload};
use crate::progress::ProgressCounters;
use crate::store::ArtifactStore;
use crate::types::{Event, FetchTarget};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::pipeline::QueueItem;

/// Everything a worker task needs, shared across the fixed pool.
pub(super) struct WorkerContext {
    pub rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueueItem>>>,
    pub fetcher: Arc<dyn Fetch>,
    pub store: Arc<ArtifactStore>,
    pub progress: Arc<ProgressCounters>,
    pub event_tx: broadcast::Sender<Event>,
    pub cancel: CancellationToken,
    pub policy: ErrorPolicy,
    pub first_error: Arc<Mutex<Option<Error>>>,
}

/// Worker task body: pull items until the queue closes or the run is
/// cancelled. Every dequeued item is marked complete on its unit tracker no
/// matter how processing ends, so the producer's drain wait cannot hang.
pub(super) async fn run_worker(ctx: WorkerContext) {
    loop {
        let item = {
            let mut rx = ctx.rx.lock().await;
            tokio::select! {
                _ = ctx.cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some(item) = item else {
            break;
        };
        ctx.progress.dequeued();
        process_target(&ctx, &item.target).await;
        item.tracker.complete();
    }
}

async fn process_target(ctx: &WorkerContext, target: &FetchTarget) {
    // The same fingerprint can be discovered on two listing pages, and a
    // concurrent sibling may already have materialized it. Re-check here.
    if ctx.store.contains(&target.key).await {
        ctx.progress.record_skipped_existing();
        emit(ctx, Event::SkippedExisting {
            key: target.key.clone(),
        });
        return;
    }

    match ctx.fetcher.fetch(&target.url).await {
        Ok(FetchPayload::Body(body)) => match ctx.store.write(&target.key, &body).await {
            Ok(_) => {
                ctx.progress.record_written();
                emit(ctx, Event::Written {
                    key: target.key.clone(),
                });
            }
            Err(e) => fail(ctx, target, e),
        },
        Ok(FetchPayload::NotFound) => {
            debug!(url = %target.url, key = %target.key, "target absent, skipping permanently");
            ctx.progress.record_skipped_absent();
            emit(ctx, Event::SkippedAbsent {
                key: target.key.clone(),
                url: target.url.clone(),
            });
        }
        Err(e) => fail(ctx, target, e),
    }
}

fn fail(ctx: &WorkerContext, target: &FetchTarget, e: Error) {
    error!(url = %target.url, key = %target.key, error = %e, "target fetch failed");
    ctx.progress.record_failed();
    emit(ctx, Event::FetchFailed {
        key: target.key.clone(),
        url: target.url.clone(),
        error: e.to_string(),
    });

    if ctx.policy == ErrorPolicy::FailFast {
        let mut slot = match ctx.first_error.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(Error::Target {
                key: target.key.clone(),
                url: target.url.clone(),
                source: Box::new(e),
            });
        }
        drop(slot);
        ctx.cancel.cancel();
    }
}

fn emit(ctx: &WorkerContext, event: Event) {
    // No subscribers is fine
    let _ = ctx.event_tx.send(event);
}
