//! Process wiring: provider, workers, coordinator, root registration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::codec::Converter;
use crate::config::Config;
use crate::error::WatchError;
use crate::events::EventBus;
use crate::formats::FormatFilter;
use crate::pool::{WorkerContext, WorkerPool};
use crate::queue::job_queue;
use crate::watch::{
    CoordinatorHandle, NotifyProvider, ProviderStreams, WatchCoordinator, WatchProvider,
};

/// Static settings for one running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub root: PathBuf,
    pub workers: usize,
    pub queue_capacity: usize,
    pub drain_on_shutdown: bool,
    pub filter: FormatFilter,
}

impl PipelineSettings {
    pub fn from_config(config: &Config, root: PathBuf) -> Self {
        Self {
            root,
            workers: config.conversion.workers,
            queue_capacity: config.conversion.queue_capacity,
            drain_on_shutdown: config.conversion.drain_on_shutdown,
            filter: config.watch.format_filter(),
        }
    }
}

/// A running watch-and-convert pipeline.
pub struct Pipeline {
    cancel: CancellationToken,
    coordinator: Arc<WatchCoordinator>,
    listeners: CoordinatorHandle,
    pool: WorkerPool,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.pool.size())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Pipeline {
    /// Start workers and listeners, then register the root directory.
    ///
    /// Failing to register the root stops everything that was started and
    /// returns the error.
    pub async fn start(
        settings: PipelineSettings,
        provider: Arc<dyn WatchProvider>,
        streams: ProviderStreams,
        converter: Arc<Converter>,
        events: Arc<EventBus>,
    ) -> Result<Self, WatchError> {
        let cancel = CancellationToken::new();
        let (jobs_tx, jobs_rx) = job_queue(settings.queue_capacity);

        let pool = WorkerPool::spawn(
            settings.workers,
            WorkerContext {
                converter,
                jobs: jobs_rx,
                root: settings.root.clone(),
                events: Arc::clone(&events),
                cancel: cancel.clone(),
                drain_on_shutdown: settings.drain_on_shutdown,
            },
        );

        let coordinator = Arc::new(WatchCoordinator::new(
            provider,
            settings.filter,
            jobs_tx,
            Arc::clone(&events),
        ));
        let listeners = Arc::clone(&coordinator).spawn(streams, cancel.clone());

        let pipeline = Self {
            cancel,
            coordinator,
            listeners,
            pool,
            events,
        };

        let registered = pipeline.coordinator.register(&settings.root);
        if let Err(e) = registered {
            pipeline.shutdown().await;
            return Err(e);
        }

        Ok(pipeline)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Stop listening for new files and wait for the workers.
    ///
    /// The job in flight on each worker always completes. Queued jobs are
    /// converted or dropped depending on `drain_on_shutdown`.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.listeners.join().await;

        // Last queue sender and the provider go away here
        drop(self.coordinator);

        self.pool.join().await;
        tracing::info!("Pipeline stopped");
    }
}

/// Run the watcher until Ctrl-C.
pub async fn run(config: &Config, root: &Path) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Watch root is not accessible: {:?}", root))?;

    let (provider, streams) =
        NotifyProvider::new(&config.watch).context("Failed to create file watcher")?;

    let converter = Arc::new(Converter::from_config(config).context("Failed to set up codec")?);

    let settings = PipelineSettings::from_config(config, root.clone());
    let pipeline = Pipeline::start(
        settings,
        Arc::new(provider),
        streams,
        converter,
        Arc::new(EventBus::default()),
    )
    .await
    .with_context(|| format!("Failed to watch root directory {:?}", root))?;

    tracing::info!(
        "Watching {:?} with {} worker(s), {:?} backend (poll interval {}s)",
        root,
        pipeline.workers(),
        config.watch.backend,
        config.watch.poll_interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    pipeline.shutdown().await;
    Ok(())
}
