// Latest derived metrics of one container, shared between its collector and the aggregator.

use super::stats;
use crate::models::{ContainerId, DerivedMetrics, RawStatSample};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectorPhase {
    Created = 0,
    Streaming = 1,
    Draining = 2,
    Closed = 3,
}

impl CollectorPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CollectorPhase::Created,
            1 => CollectorPhase::Streaming,
            2 => CollectorPhase::Draining,
            _ => CollectorPhase::Closed,
        }
    }
}

/// Metrics published for the most recent fully processed sample.
#[derive(Debug, Clone)]
pub struct LatestSample {
    pub metrics: DerivedMetrics,
    pub sample: Arc<RawStatSample>,
}

pub struct CollectorState {
    id: ContainerId,
    display_name: OnceLock<String>,
    latest: RwLock<Option<LatestSample>>,
    phase: AtomicU8,
}

impl CollectorState {
    pub fn new(id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            display_name: OnceLock::new(),
            latest: RwLock::new(None),
            phase: AtomicU8::new(CollectorPhase::Created as u8),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved once the collector has inspected its container.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.get().map(String::as_str)
    }

    pub(crate) fn set_display_name(&self, name: String) {
        let _ = self.display_name.set(name);
    }

    /// Derives metrics for `current` and publishes them, with the raw sample, as one value.
    /// Readers see either the previous group or this one, never a mix.
    pub async fn update(
        &self,
        previous: Option<&RawStatSample>,
        current: Arc<RawStatSample>,
        timestamp: i64,
    ) -> DerivedMetrics {
        let metrics = stats::derive_metrics(previous, &current, timestamp);
        let latest = LatestSample {
            metrics: metrics.clone(),
            sample: current,
        };
        *self.latest.write().await = Some(latest);
        metrics
    }

    /// Copy of the latest published group; `None` before the first sample.
    pub async fn read(&self) -> Option<LatestSample> {
        self.latest.read().await.clone()
    }

    pub fn phase(&self) -> CollectorPhase {
        CollectorPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: CollectorPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Moves to `Draining` unless the collector already closed.
    pub(crate) fn mark_draining(&self) {
        let _ = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| {
                (p != CollectorPhase::Closed as u8).then_some(CollectorPhase::Draining as u8)
            });
    }
}
