//! Bounded FIFO job queue between the watcher and the conversion workers.
//!
//! The sender side blocks when the queue is full. That stall propagates back
//! to the watcher's event listener, which stops draining provider events until
//! a worker frees a slot. Every worker holds a clone of the receiver and the
//! channel hands each job to exactly one of them.

use async_channel as chan;
use std::path::{Path, PathBuf};

/// A single source file accepted for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    path: PathBuf,
}

impl ConversionJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Returned when submitting to a queue whose workers have all gone away.
#[derive(Debug, thiserror::Error)]
#[error("Job queue is closed")]
pub struct QueueClosed(pub ConversionJob);

/// Producer half of the job queue.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: chan::Sender<ConversionJob>,
}

impl JobSender {
    /// Enqueue a job, waiting for a free slot if the queue is full.
    pub async fn submit(&self, job: ConversionJob) -> Result<(), QueueClosed> {
        self.tx.send(job).await.map_err(|e| QueueClosed(e.0))
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.tx
            .capacity()
            .map_or(usize::MAX, |cap| cap.saturating_sub(self.tx.len()))
    }
}

/// Consumer half of the job queue. Clone one per worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: chan::Receiver<ConversionJob>,
}

impl JobReceiver {
    /// Wait for the next job.
    ///
    /// Returns `None` once every sender is dropped and the queue is empty.
    pub async fn next(&self) -> Option<ConversionJob> {
        self.rx.recv().await.ok()
    }

    /// Take a job only if one is immediately available.
    pub fn try_next(&self) -> Option<ConversionJob> {
        self.rx.try_recv().ok()
    }

    /// Discard every job still buffered, returning how many were dropped.
    pub fn discard_pending(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// Create a job queue holding at most `capacity` pending jobs.
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = chan::bounded(capacity.max(1));
    (JobSender { tx }, JobReceiver { rx })
}
