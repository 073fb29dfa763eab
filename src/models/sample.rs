// Raw stat records as decoded from a container's stats stream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime-assigned container identifier. A restarted container gets a new one.
pub type ContainerId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Network byte counters in whichever shape the runtime reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkCounters {
    #[default]
    Absent,
    /// Single `network` object (Docker API 1.20 and earlier).
    Legacy(InterfaceCounters),
    /// Named interfaces (`networks` map, Docker API 1.21 and later).
    Interfaces(BTreeMap<String, InterfaceCounters>),
}

impl NetworkCounters {
    /// Summed `(rx, tx)` over every interface, or `None` when the sample had no network data.
    pub fn totals(&self) -> Option<(u64, u64)> {
        match self {
            NetworkCounters::Absent => None,
            NetworkCounters::Legacy(c) => Some((c.rx_bytes, c.tx_bytes)),
            NetworkCounters::Interfaces(ifaces) => Some(ifaces.values().fold((0, 0), |acc, c| {
                (
                    acc.0.saturating_add(c.rx_bytes),
                    acc.1.saturating_add(c.tx_bytes),
                )
            })),
        }
    }
}

/// One `{op, value}` block-IO entry, e.g. `{"op": "Read", "value": 4096}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlkioEntry {
    pub op: String,
    pub value: u64,
}

impl BlkioEntry {
    pub fn new(op: impl Into<String>, value: u64) -> Self {
        Self {
            op: op.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStatSample {
    pub cpu_usage_user: u64,
    pub cpu_usage_kernel: u64,
    pub cpu_usage_total: u64,
    pub system_cpu_usage: u64,
    pub per_cpu_count: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network: NetworkCounters,
    pub io_service_bytes: Vec<BlkioEntry>,
    pub io_serviced: Vec<BlkioEntry>,
}
