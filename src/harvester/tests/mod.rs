#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::{ErrorPolicy, SourceConfig};
use crate::error::Error;
use crate::fetch::{Fetch, FetchPayload};
use crate::types::{RunOutcome, TargetKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable fetcher that records call order and tracks peak concurrency.
struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

#[derive(Clone)]
enum StubResponse {
    Body(Vec<u8>),
    NotFound,
    Status(u16),
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn body(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Body(body.as_bytes().to_vec()));
        self
    }

    fn not_found(mut self, url: &str) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::NotFound);
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), StubResponse::Status(status));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, url: &str) -> crate::error::Result<FetchPayload> {
        self.calls.lock().unwrap().push(url.to_string());
        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(depth, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(url).cloned() {
            Some(StubResponse::Body(body)) => Ok(FetchPayload::Body(body)),
            Some(StubResponse::NotFound) | None => Ok(FetchPayload::NotFound),
            Some(StubResponse::Status(status)) => Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            }),
        }
    }
}

fn range_config(dir: &std::path::Path, start: u64, end: u64) -> Config {
    Config {
        source: SourceConfig::Range {
            url_template: "http://x/doc/{id}".to_string(),
            start,
            end,
            descending: false,
        },
        harvest: crate::config::HarvestConfig {
            output_dir: dir.join("artifacts"),
            checkpoint_path: dir.join("checkpoint.json"),
            ..Default::default()
        },
        on_fetch_error: ErrorPolicy::default(),
    }
}

fn stub_for_range(start: u64, end: u64) -> StubFetcher {
    let mut stub = StubFetcher::new();
    for id in start..=end {
        stub = stub.body(&format!("http://x/doc/{id}"), &format!("<html>{id}</html>"));
    }
    stub
}

#[tokio::test]
async fn range_run_writes_one_artifact_per_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 5);
    let harvester =
        Harvester::with_fetcher(config, Arc::new(stub_for_range(1, 5))).unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.written, 5);
    assert_eq!(report.summary.failed, 0);

    for id in 1..=5u64 {
        let path = dir.path().join("artifacts").join(format!("{id}.html"));
        assert!(path.is_file(), "artifact for id {id} must exist");
    }

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(checkpoint.cursor, 1, "5 ids fit in one default-sized chunk");
    assert_eq!(checkpoint.completed, 5);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_configured_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 1, 30);
    config.harvest.max_concurrent_fetches = 5;
    config.harvest.queue_capacity = 10;

    let stub = Arc::new(stub_for_range(1, 30).with_delay(Duration::from_millis(5)));
    let harvester = Harvester::with_fetcher(config, Arc::clone(&stub) as Arc<dyn Fetch>).unwrap();

    harvester.run().await.unwrap();
    assert!(
        stub.peak() <= 5,
        "observed {} concurrent fetches with a limit of 5",
        stub.peak()
    );
    assert_eq!(stub.calls().len(), 30);
}

#[tokio::test]
async fn queue_depth_never_exceeds_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 1, 40);
    config.harvest.max_concurrent_fetches = 2;
    config.harvest.queue_capacity = 4;

    let stub = Arc::new(stub_for_range(1, 40).with_delay(Duration::from_millis(2)));
    let harvester = Harvester::with_fetcher(config, stub as Arc<dyn Fetch>).unwrap();

    let report = harvester.run().await.unwrap();
    assert!(
        report.summary.queue_high_water <= 4,
        "queue high water {} exceeds the configured capacity",
        report.summary.queue_high_water
    );
}

#[tokio::test]
async fn existing_artifacts_are_never_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 4);
    tokio::fs::create_dir_all(dir.path().join("artifacts"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("artifacts/2.html"), "<html>old</html>")
        .await
        .unwrap();

    let stub = Arc::new(stub_for_range(1, 4));
    let harvester = Harvester::with_fetcher(config, Arc::clone(&stub) as Arc<dyn Fetch>).unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.summary.written, 3);
    assert_eq!(report.summary.skipped_existing, 1);
    assert!(
        !stub.calls().contains(&"http://x/doc/2".to_string()),
        "existing artifact must not be fetched again"
    );
    assert_eq!(
        tokio::fs::read_to_string(dir.path().join("artifacts/2.html"))
            .await
            .unwrap(),
        "<html>old</html>",
        "existing artifact must not be overwritten"
    );
}

#[tokio::test]
async fn not_found_targets_are_skipped_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 3);
    let stub = StubFetcher::new()
        .body("http://x/doc/1", "<html>1</html>")
        .not_found("http://x/doc/2")
        .body("http://x/doc/3", "<html>3</html>");
    let harvester = Harvester::with_fetcher(config, Arc::new(stub)).unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.written, 2);
    assert_eq!(report.summary.skipped_absent, 1);
    assert_eq!(report.summary.failed, 0);
    assert!(!dir.path().join("artifacts/2.html").exists());

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(
        checkpoint.completed, 3,
        "absent targets still count toward completion"
    );
}

#[tokio::test]
async fn server_error_fails_fast_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 1, 6);
    config.harvest.range_chunk_size = 2;

    let stub = stub_for_range(1, 6).status("http://x/doc/5", 500);
    let harvester = Harvester::with_fetcher(config, Arc::new(stub)).unwrap();

    let err = harvester.run().await.unwrap_err();
    assert!(
        matches!(err, Error::Target { .. }),
        "run must surface the failing target: {err}"
    );

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(
        checkpoint.cursor, 2,
        "checkpoint must not advance past the unit containing the failure"
    );
}

#[tokio::test]
async fn isolate_policy_records_failures_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 1, 6);
    config.harvest.range_chunk_size = 2;
    config.on_fetch_error = ErrorPolicy::Isolate;

    let stub = stub_for_range(1, 6).status("http://x/doc/3", 503);
    let harvester = Harvester::with_fetcher(config, Arc::new(stub)).unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.written, 5);

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(checkpoint.cursor, 3, "all three chunks drain under isolate");
}

#[tokio::test]
async fn pre_cancelled_run_is_interrupted_without_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 10);
    let stub = Arc::new(stub_for_range(1, 10));
    let harvester = Harvester::with_fetcher(config, Arc::clone(&stub) as Arc<dyn Fetch>).unwrap();

    harvester.shutdown();
    let report = harvester.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn resume_skips_units_before_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 1, 6);
    config.harvest.range_chunk_size = 2;

    // Simulate a prior run that drained units 1 and 2 (ids 1..=4).
    tokio::fs::create_dir_all(dir.path().join("artifacts"))
        .await
        .unwrap();
    for id in 1..=4u64 {
        tokio::fs::write(
            dir.path().join(format!("artifacts/{id}.html")),
            "<html>done</html>",
        )
        .await
        .unwrap();
    }
    let store = crate::checkpoint::CheckpointStore::new(dir.path().join("checkpoint.json"));
    store
        .save(&crate::checkpoint::Checkpoint {
            cursor: 2,
            expected_total: Some(3),
            completed: 4,
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let stub = Arc::new(stub_for_range(1, 6));
    let harvester = Harvester::with_fetcher(config, Arc::clone(&stub) as Arc<dyn Fetch>).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.summary.written, 2, "only ids 5 and 6 remain");
    let mut calls = stub.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec!["http://x/doc/5".to_string(), "http://x/doc/6".to_string()],
        "checkpointed units must not be re-enumerated"
    );

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(checkpoint.cursor, 3);
    assert_eq!(checkpoint.completed, 6, "completed accumulates across runs");
}

#[tokio::test]
async fn resumed_listing_run_keeps_the_stored_total_estimate() {
    fn listing_html(hrefs: &[&str]) -> String {
        let items: String = hrefs
            .iter()
            .map(|href| format!(r#"<li><a href="{href}">doc</a></li>"#))
            .collect();
        format!(r#"<html><body><ul id="results-list">{items}</ul></body></html>"#)
    }

    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        source: SourceConfig::Listing {
            url_template: "http://x/search?page={page}".to_string(),
            page_size: 2,
            total_selector: ".results-count".to_string(),
            link_selector: "#results-list li a".to_string(),
            base_url: Some("http://x/".to_string()),
        },
        harvest: crate::config::HarvestConfig {
            output_dir: dir.path().join("artifacts"),
            checkpoint_path: dir.path().join("checkpoint.json"),
            ..Default::default()
        },
        on_fetch_error: ErrorPolicy::default(),
    };

    // A prior run read the advertised total from page 1 and drained 2 pages.
    let store = crate::checkpoint::CheckpointStore::new(dir.path().join("checkpoint.json"));
    store
        .save(&crate::checkpoint::Checkpoint {
            cursor: 2,
            expected_total: Some(5),
            completed: 4,
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let stub = StubFetcher::new()
        .body("http://x/search?page=3", &listing_html(&["/doc/5", "/doc/6"]))
        .body("http://x/search?page=4", &listing_html(&[]))
        .body("http://x/doc/5", "<html>5</html>")
        .body("http://x/doc/6", "<html>6</html>");
    let harvester = Harvester::with_fetcher(config, Arc::new(stub)).unwrap();
    let mut events = harvester.subscribe();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.written, 2);

    let checkpoint = harvester.checkpoints.load().await.unwrap();
    assert_eq!(checkpoint.cursor, 3);
    assert_eq!(checkpoint.completed, 6);
    assert_eq!(
        checkpoint.expected_total,
        Some(5),
        "resumed run must carry the checkpointed estimate forward"
    );

    let mut saw_unit = false;
    while let Ok(event) = events.try_recv() {
        if let Event::UnitCompleted { expected_total, .. } = event {
            assert_eq!(expected_total, Some(5));
            saw_unit = true;
        }
    }
    assert!(saw_unit, "a unit completion event must have been emitted");
}

#[tokio::test]
async fn corrupt_checkpoint_restarts_with_dedup_preventing_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 3);
    tokio::fs::write(dir.path().join("checkpoint.json"), "not json at all")
        .await
        .unwrap();
    tokio::fs::create_dir_all(dir.path().join("artifacts"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("artifacts/1.html"), "<html>1</html>")
        .await
        .unwrap();

    let stub = Arc::new(stub_for_range(1, 3));
    let harvester = Harvester::with_fetcher(config, Arc::clone(&stub) as Arc<dyn Fetch>).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.skipped_existing, 1);
    assert_eq!(report.summary.written, 2);
    assert!(!stub.calls().contains(&"http://x/doc/1".to_string()));
}

#[tokio::test]
async fn events_cover_every_terminal_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = range_config(dir.path(), 1, 3);
    let stub = StubFetcher::new()
        .body("http://x/doc/1", "<html>1</html>")
        .not_found("http://x/doc/2")
        .body("http://x/doc/3", "<html>3</html>");
    let harvester = Harvester::with_fetcher(config, Arc::new(stub)).unwrap();
    let mut events = harvester.subscribe();

    harvester.run().await.unwrap();

    let mut written = 0;
    let mut absent = 0;
    let mut unit_completed = 0;
    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::Written { .. } => written += 1,
            Event::SkippedAbsent { key, .. } => {
                assert_eq!(key, TargetKey::Id(2));
                absent += 1;
            }
            Event::UnitCompleted { cursor, .. } => {
                assert_eq!(cursor, 1);
                unit_completed += 1;
            }
            Event::Completed { summary } => {
                assert_eq!(summary.written, 2);
                completed += 1;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(written, 2);
    assert_eq!(absent, 1);
    assert_eq!(unit_completed, 1);
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = range_config(dir.path(), 5, 1);
    config.source = SourceConfig::Range {
        url_template: "http://x/doc/{id}".to_string(),
        start: 5,
        end: 1,
        descending: false,
    };
    let result = Harvester::with_fetcher(config, Arc::new(StubFetcher::new()));
    assert!(matches!(result, Err(Error::Config { .. })));
}
