// One long-lived stats stream per container.

use super::state::{CollectorPhase, CollectorState};
use crate::error::{CollectorError, RuntimeError};
use crate::models::{ContainerId, RawStatSample};
use crate::runtime::{RuntimeClient, StatsStream};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

/// Source of the processing timestamp stamped on each sample.
pub trait Clock: Send + Sync {
    /// Unix seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// How a collector that reached streaming (or found its container gone) stopped.
#[derive(Debug)]
pub enum CollectorExit {
    /// The runtime closed the stream.
    EndOfStream,
    /// Shutdown was requested.
    Cancelled,
    /// The container disappeared between listing and inspection or stream open.
    Vanished,
    /// Read failed mid-stream; handled like end of stream.
    StreamError(RuntimeError),
}

pub type CollectorOutcome = Result<CollectorExit, CollectorError>;

pub struct ContainerCollector {
    id: ContainerId,
    runtime: Arc<dyn RuntimeClient>,
    clock: Arc<dyn Clock>,
    state: Arc<CollectorState>,
    previous: Option<Arc<RawStatSample>>,
    stream: Option<StatsStream>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ContainerCollector {
    pub fn new(
        id: ContainerId,
        runtime: Arc<dyn RuntimeClient>,
        clock: Arc<dyn Clock>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let state = Arc::new(CollectorState::new(id.clone()));
        Self {
            id,
            runtime,
            clock,
            state,
            previous: None,
            stream: None,
            shutdown_rx,
        }
    }

    /// Creates a collector for `id` and runs it on its own task.
    pub fn spawn(
        id: ContainerId,
        runtime: Arc<dyn RuntimeClient>,
        clock: Arc<dyn Clock>,
    ) -> CollectorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let collector = ContainerCollector::new(id.clone(), runtime, clock, shutdown_rx);
        let state = collector.state.clone();
        let span = info_span!("collector", container_id = %id);
        let task = tokio::spawn(collector.run().instrument(span));
        CollectorHandle {
            id,
            state,
            shutdown_tx,
            task,
        }
    }

    pub fn state(&self) -> Arc<CollectorState> {
        self.state.clone()
    }

    /// Resolves the display name and opens the stats stream.
    pub async fn start(&mut self) -> Result<(), CollectorError> {
        let details = self
            .runtime
            .inspect(&self.id)
            .await
            .map_err(|source| CollectorError::Inspect {
                id: self.id.clone(),
                source,
            })?;
        self.state.set_display_name(details.display_name);

        let stream = self
            .runtime
            .open_stats_stream(&self.id)
            .await
            .map_err(|source| CollectorError::Connection {
                id: self.id.clone(),
                source,
            })?;
        self.stream = Some(stream);
        self.state.set_phase(CollectorPhase::Streaming);
        Ok(())
    }

    /// Runs the collector to completion. Every exit path releases the stream through
    /// [`ContainerCollector::shutdown`] before the phase becomes `Closed`.
    pub async fn run(mut self) -> CollectorOutcome {
        let mut cancel_rx = self.shutdown_rx.clone();
        let started = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => None,
            r = self.start() => Some(r),
        };

        let outcome = match started {
            None => Ok(CollectorExit::Cancelled),
            Some(Ok(())) => Ok(self.stream_samples().await),
            Some(Err(
                CollectorError::Inspect {
                    source: RuntimeError::NotFound(_),
                    ..
                }
                | CollectorError::Connection {
                    source: RuntimeError::NotFound(_),
                    ..
                },
            )) => Ok(CollectorExit::Vanished),
            Some(Err(e)) => Err(e),
        };

        self.shutdown();
        self.state.set_phase(CollectorPhase::Closed);
        outcome
    }

    async fn stream_samples(&mut self) -> CollectorExit {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return CollectorExit::Cancelled;
            };
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown_rx) => return CollectorExit::Cancelled,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(sample)) => self.process(sample).await,
                Some(Err(e)) => return CollectorExit::StreamError(e),
                None => return CollectorExit::EndOfStream,
            }
        }
    }

    async fn process(&mut self, sample: RawStatSample) {
        let current = Arc::new(sample);
        let timestamp = self.clock.now();
        self.state
            .update(self.previous.as_deref(), current.clone(), timestamp)
            .await;
        self.previous = Some(current);
    }

    /// Releases the stream handle. Idempotent; the handle is dropped exactly once.
    pub fn shutdown(&mut self) {
        self.state.mark_draining();
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!(container_id = %self.id, "stats stream released");
        }
    }
}

/// Resolves once shutdown is requested. A dropped sender counts as a request.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Remote control for a spawned [`ContainerCollector`].
pub struct CollectorHandle {
    id: ContainerId,
    state: Arc<CollectorState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<CollectorOutcome>,
}

impl CollectorHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &Arc<CollectorState> {
        &self.state
    }

    /// Asks the collector to stop. Returns immediately; callable any number of times.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.state.mark_draining();
    }

    /// True once the collector task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the collector task. Only returns `None` if the task panicked.
    pub async fn join(self) -> Option<CollectorOutcome> {
        match self.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(container_id = %self.id, error = %e, "collector task failed");
                self.state.set_phase(CollectorPhase::Closed);
                None
            }
        }
    }
}
