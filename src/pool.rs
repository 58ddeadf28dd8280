//! Fixed-size pool of conversion workers draining the job queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::Converter;
use crate::events::{EventBus, EventPayload};
use crate::queue::{ConversionJob, JobReceiver};

/// Everything a worker needs, shared by all workers in a pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub converter: Arc<Converter>,
    pub jobs: JobReceiver,
    /// Watched root, used to shorten paths in log output.
    pub root: PathBuf,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
    /// Keep taking queued jobs after cancellation until the queue closes.
    pub drain_on_shutdown: bool,
}

/// Handles to the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    jobs: JobReceiver,
    drain_on_shutdown: bool,
}

impl WorkerPool {
    /// Spawn `size` workers with ids `0..size`.
    pub fn spawn(size: usize, ctx: WorkerContext) -> Self {
        let size = size.max(1);
        let handles = (0..size)
            .map(|id| tokio::spawn(run_worker(id, ctx.clone())))
            .collect();

        tracing::info!(
            "Started {} conversion worker(s) using {}",
            size,
            ctx.converter.codec_name()
        );

        Self {
            handles,
            jobs: ctx.jobs,
            drain_on_shutdown: ctx.drain_on_shutdown,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Conversion worker panicked: {}", e);
            }
        }

        if !self.drain_on_shutdown {
            let dropped = self.jobs.discard_pending();
            if dropped > 0 {
                tracing::warn!("Abandoned {} queued conversion job(s) on shutdown", dropped);
            }
        }
    }
}

async fn run_worker(id: usize, ctx: WorkerContext) {
    tracing::debug!(worker = id, "Conversion worker started");

    loop {
        let job = tokio::select! {
            biased;

            _ = ctx.cancel.cancelled(), if !ctx.drain_on_shutdown => break,
            job = ctx.jobs.next() => match job {
                Some(job) => job,
                None => break,
            },
        };

        process_job(id, job, &ctx).await;
    }

    tracing::debug!(worker = id, "Conversion worker stopped");
}

async fn process_job(id: usize, job: ConversionJob, ctx: &WorkerContext) {
    let source = job.path();
    let relative = relative_to(&ctx.root, source);

    match ctx.converter.convert(source).await {
        Ok(converted) => {
            if let Some(err) = &converted.delete_error {
                tracing::warn!(worker = id, "{}", err);
                ctx.events.broadcast(EventPayload::DeleteFailed {
                    worker: id,
                    source: source.to_path_buf(),
                    error: err.to_string(),
                });
            }

            tracing::info!(
                worker = id,
                "Converted {} to {} in {:.1} seconds",
                relative.display(),
                relative_to(&ctx.root, &converted.output).display(),
                converted.elapsed.as_secs_f64()
            );
            ctx.events.broadcast(EventPayload::ConversionCompleted {
                worker: id,
                source: source.to_path_buf(),
                output: converted.output,
                elapsed: converted.elapsed,
            });
        }
        Err(failure) => {
            tracing::error!(
                worker = id,
                "Failed to convert {} after {:.1} seconds: {}",
                relative.display(),
                failure.elapsed.as_secs_f64(),
                failure.error
            );
            ctx.events.broadcast(EventPayload::ConversionFailed {
                worker: id,
                source: source.to_path_buf(),
                error: failure.error.to_string(),
                elapsed: failure.elapsed,
            });
        }
    }
}

/// `path` relative to `root`, or `path` unchanged when it lies outside it.
pub fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
