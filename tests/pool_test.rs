//! Worker pool behaviour under load.

mod common;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::SlowCodec;
use tokio_util::sync::CancellationToken;
use webpify::codec::Converter;
use webpify::events::{EventBus, EventPayload};
use webpify::pool::{WorkerContext, WorkerPool};
use webpify::queue::{job_queue, ConversionJob};

#[tokio::test]
async fn every_job_runs_once_with_bounded_concurrency() {
    const WORKERS: usize = 3;
    const JOBS: usize = 12;

    let dir = tempfile::tempdir().unwrap();
    let codec = SlowCodec::new(Duration::from_millis(30));
    let events = Arc::new(EventBus::default());
    let (tx, rx) = job_queue(4);

    let pool = WorkerPool::spawn(
        WORKERS,
        WorkerContext {
            converter: Arc::new(Converter::new(codec.clone(), Duration::ZERO, 80)),
            jobs: rx,
            root: dir.path().to_path_buf(),
            events: events.clone(),
            cancel: CancellationToken::new(),
            drain_on_shutdown: true,
        },
    );
    assert_eq!(pool.size(), WORKERS);

    let mut sources = Vec::new();
    for i in 0..JOBS {
        let path = dir.path().join(format!("photo-{i}.jpg"));
        std::fs::write(&path, b"jpeg").unwrap();
        // Blocks whenever all four slots are taken
        tx.submit(ConversionJob::new(path.clone())).await.unwrap();
        sources.push(path);
    }
    drop(tx);
    pool.join().await;

    assert_eq!(codec.calls.load(Ordering::SeqCst), JOBS);
    let max = codec.max_active.load(Ordering::SeqCst);
    assert!(max <= WORKERS, "{max} encodes ran at once");
    assert!(max >= 1);

    let mut completed: HashMap<PathBuf, usize> = HashMap::new();
    let mut workers_seen = Vec::new();
    for payload in events.recent_payloads() {
        if let EventPayload::ConversionCompleted { source, worker, .. } = payload {
            *completed.entry(source).or_default() += 1;
            workers_seen.push(worker);
        }
    }
    assert_eq!(completed.len(), JOBS);
    assert!(completed.values().all(|&n| n == 1));
    assert!(workers_seen.iter().all(|&w| w < WORKERS));

    for source in &sources {
        assert!(!source.exists());
        assert!(source.with_extension("webp").exists());
    }
}

#[tokio::test]
async fn failed_job_does_not_stop_worker() {
    let dir = tempfile::tempdir().unwrap();
    let codec = SlowCodec::new(Duration::ZERO);
    let events = Arc::new(EventBus::default());
    let (tx, rx) = job_queue(4);

    let pool = WorkerPool::spawn(
        1,
        WorkerContext {
            converter: Arc::new(Converter::new(codec.clone(), Duration::ZERO, 80)),
            jobs: rx,
            root: dir.path().to_path_buf(),
            events: events.clone(),
            cancel: CancellationToken::new(),
            drain_on_shutdown: true,
        },
    );

    // Output directory does not exist, so writing the WebP fails
    let missing = dir.path().join("gone").join("a.png");
    let present = dir.path().join("b.png");
    std::fs::write(&present, b"png").unwrap();

    tx.submit(ConversionJob::new(missing.clone())).await.unwrap();
    tx.submit(ConversionJob::new(present.clone())).await.unwrap();
    drop(tx);
    pool.join().await;

    let payloads = events.recent_payloads();
    assert!(payloads.iter().any(
        |p| matches!(p, EventPayload::ConversionFailed { source, .. } if *source == missing)
    ));
    assert!(payloads.iter().any(
        |p| matches!(p, EventPayload::ConversionCompleted { source, .. } if *source == present)
    ));
}

#[tokio::test]
async fn delete_failure_is_reported_apart_from_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(EventBus::default());
    let (tx, rx) = job_queue(4);

    let pool = WorkerPool::spawn(
        1,
        WorkerContext {
            converter: Arc::new(Converter::new(
                SlowCodec::new(Duration::ZERO),
                Duration::ZERO,
                80,
            )),
            jobs: rx,
            root: dir.path().to_path_buf(),
            events: events.clone(),
            cancel: CancellationToken::new(),
            drain_on_shutdown: true,
        },
    );

    // A non-empty directory cannot be removed as a file
    let source = dir.path().join("locked.png");
    std::fs::create_dir(&source).unwrap();
    std::fs::write(source.join("keep"), b"x").unwrap();

    tx.submit(ConversionJob::new(source.clone())).await.unwrap();
    drop(tx);
    pool.join().await;

    let payloads = events.recent_payloads();
    assert_eq!(payloads.len(), 2, "{payloads:?}");
    assert!(matches!(
        &payloads[0],
        EventPayload::DeleteFailed { source: s, error, .. } if *s == source && !error.is_empty()
    ));
    assert!(matches!(
        &payloads[1],
        EventPayload::ConversionCompleted { source: s, .. } if *s == source
    ));
    assert!(!payloads
        .iter()
        .any(|p| matches!(p, EventPayload::ConversionFailed { .. })));
    assert!(source.exists());
    assert!(dir.path().join("locked.webp").exists());
}

#[tokio::test]
async fn cancelled_pool_without_drain_stops_idle_workers() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let (tx, rx) = job_queue(4);

    let pool = WorkerPool::spawn(
        2,
        WorkerContext {
            converter: Arc::new(Converter::new(
                SlowCodec::new(Duration::ZERO),
                Duration::ZERO,
                80,
            )),
            jobs: rx,
            root: dir.path().to_path_buf(),
            events: Arc::new(EventBus::default()),
            cancel: cancel.clone(),
            drain_on_shutdown: false,
        },
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("workers should exit while the sender is still alive");
    drop(tx);
}
