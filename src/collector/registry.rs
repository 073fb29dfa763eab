// Keeps exactly one live collector per running container.

use super::container::{Clock, CollectorExit, CollectorHandle, CollectorOutcome, ContainerCollector};
use crate::models::ContainerId;
use crate::runtime::RuntimeClient;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one [`CollectorRegistry::reconcile`] pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<ContainerId>,
    pub stopped: Vec<ContainerId>,
    /// Collectors that had already exited on their own and were removed.
    pub reaped: Vec<ContainerId>,
}

pub struct CollectorRegistry {
    runtime: Arc<dyn RuntimeClient>,
    clock: Arc<dyn Clock>,
    collectors: HashMap<ContainerId, CollectorHandle>,
}

impl CollectorRegistry {
    pub fn new(runtime: Arc<dyn RuntimeClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            runtime,
            clock,
            collectors: HashMap::new(),
        }
    }

    /// Brings the collector table in line with `running`.
    ///
    /// Collectors whose task already ended (stream closed, open failed) are reaped first, so a
    /// still-running container gets a fresh, cold collector in the same pass. Stopped containers
    /// are all signalled before any is joined. New collectors are spawned without waiting for
    /// them to reach streaming.
    pub async fn reconcile(&mut self, running: &HashSet<ContainerId>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let finished: Vec<ContainerId> = self
            .collectors
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for id in finished {
            if let Some(handle) = self.collectors.remove(&id) {
                log_outcome(&id, handle.join().await);
                report.reaped.push(id);
            }
        }

        let stopped_ids: Vec<ContainerId> = self
            .collectors
            .keys()
            .filter(|id| !running.contains(*id))
            .cloned()
            .collect();
        let stopped: Vec<CollectorHandle> = stopped_ids
            .iter()
            .filter_map(|id| self.collectors.remove(id))
            .collect();
        for handle in &stopped {
            info!(container_id = %handle.id(), "container has stopped");
            handle.shutdown();
        }
        for handle in stopped {
            let id = handle.id().to_string();
            log_outcome(&id, handle.join().await);
            report.stopped.push(id);
        }

        for id in running {
            if self.collectors.contains_key(id) {
                continue;
            }
            info!(container_id = %id, "monitoring activity of container");
            let handle =
                ContainerCollector::spawn(id.clone(), self.runtime.clone(), self.clock.clone());
            self.collectors.insert(id.clone(), handle);
            report.started.push(id.clone());
        }

        report
    }

    /// Stops every collector and waits until all of them are closed.
    pub async fn shutdown_all(&mut self) {
        let handles: Vec<CollectorHandle> = self.collectors.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.shutdown();
        }
        for handle in handles {
            let id = handle.id().to_string();
            log_outcome(&id, handle.join().await);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.collectors.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CollectorHandle> {
        self.collectors.get(id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &CollectorHandle> {
        self.collectors.values()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

fn log_outcome(id: &str, outcome: Option<CollectorOutcome>) {
    match outcome {
        Some(Ok(CollectorExit::EndOfStream)) => {
            info!(container_id = %id, "stats stream ended")
        }
        Some(Ok(CollectorExit::Cancelled)) => {
            debug!(container_id = %id, "collector stopped")
        }
        Some(Ok(CollectorExit::Vanished)) => {
            info!(container_id = %id, kind = "not_found", "container vanished before streaming")
        }
        Some(Ok(CollectorExit::StreamError(e))) => {
            warn!(container_id = %id, kind = e.kind(), error = %e, "stats stream interrupted")
        }
        Some(Err(e)) => {
            warn!(container_id = %id, kind = e.kind(), error = %e, "collector could not start")
        }
        None => {}
    }
}
