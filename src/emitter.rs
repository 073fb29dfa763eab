// Tick loop: reconcile collectors, wait, aggregate, forward. Owns shutdown ordering.

use crate::aggregator;
use crate::collector::{Clock, CollectorRegistry};
use crate::runtime::RuntimeClient;
use crate::sink::Sink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

/// Stop request shared between signal handlers and the tick loop.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            info!("termination requested");
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Sleeps for `delay`, waking early if a stop is requested.
    pub async fn sleep(&self, delay: Duration) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = notified => {}
        }
    }
}

pub struct Emitter {
    runtime: Arc<dyn RuntimeClient>,
    registry: CollectorRegistry,
    sink: Box<dyn Sink>,
    delay: Duration,
    stop: StopSignal,
}

impl Emitter {
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        sink: Box<dyn Sink>,
        clock: Arc<dyn Clock>,
        delay: Duration,
    ) -> Self {
        Self {
            registry: CollectorRegistry::new(runtime.clone(), clock),
            runtime,
            sink,
            delay,
            stop: StopSignal::new(),
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs until a stop is requested, then stops every collector and closes the sink, in that
    /// order.
    #[instrument(skip(self), fields(delay_ms = self.delay.as_millis() as u64))]
    pub async fn run(mut self) {
        while !self.stop.is_stopped() {
            match self.runtime.list_running().await {
                Ok(running) => {
                    let report = self.registry.reconcile(&running).await;
                    debug!(
                        running = running.len(),
                        started = report.started.len(),
                        stopped = report.stopped.len(),
                        reaped = report.reaped.len(),
                        "collectors reconciled"
                    );
                }
                Err(e) => warn!(
                    kind = e.kind(),
                    error = %e,
                    operation = "list_running",
                    "could not list running containers"
                ),
            }

            self.stop.sleep(self.delay).await;
            if self.stop.is_stopped() {
                break;
            }

            let batch = aggregator::snapshot_all(&self.registry).await;
            let containers = batch.len();
            if let Err(e) = self.sink.forward(self.runtime.as_ref(), batch).await {
                warn!(kind = e.kind(), error = %e, containers, "forwarding batch failed");
            }
        }

        info!(
            collectors = self.registry.len(),
            "waiting for all collectors to terminate"
        );
        self.registry.shutdown_all().await;
        if let Err(e) = self.sink.close().await {
            warn!(kind = e.kind(), error = %e, "closing sink failed");
        }
        info!("collectors terminated");
    }
}

/// Spawns the emitter loop. Stop it through the signal from [`Emitter::stop_signal`].
pub fn spawn(emitter: Emitter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(emitter.run())
}
