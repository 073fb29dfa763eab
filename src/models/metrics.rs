// Per-container metrics derived from consecutive raw samples

use super::sample::{ContainerId, RawStatSample};
use serde::Serialize;
use std::sync::Arc;

/// Block-IO counters keyed by operation class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoCounters {
    pub read: u64,
    pub write: u64,
    pub sync: u64,
    #[serde(rename = "async")]
    pub async_: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub user_cpu_percent: f64,
    pub kernel_cpu_percent: f64,
    pub memory_used: u64,
    pub memory_limit: u64,
    /// `None` when the sample cannot yield a percentage (zero limit).
    pub memory_percent: Option<f64>,
    pub network_rx_delta: i64,
    pub network_tx_delta: i64,
    pub io_bytes: IoCounters,
    pub io_ops: IoCounters,
    /// Unix seconds at which the collector processed the sample.
    pub timestamp: i64,
}

/// One entry of an emitted batch.
#[derive(Debug, Clone)]
pub struct ContainerSnapshot {
    pub id: ContainerId,
    pub name: String,
    pub metrics: DerivedMetrics,
    /// Raw sample the metrics were derived from, for enrichment producers.
    pub sample: Arc<RawStatSample>,
}
