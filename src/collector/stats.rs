// Derive per-container metrics from two consecutive raw samples.

use crate::error::ComputationError;
use crate::models::{BlkioEntry, DerivedMetrics, IoCounters, RawStatSample};
use std::collections::BTreeMap;

/// Computes the metric group for `current`.
///
/// Without a `previous` sample both CPU percentages are 0 (warm-up). Network deltas are taken
/// against the previous summed totals, or against 0 on the first sample, which yields one large
/// delta when a collector starts.
pub fn derive_metrics(
    previous: Option<&RawStatSample>,
    current: &RawStatSample,
    timestamp: i64,
) -> DerivedMetrics {
    let (user_cpu_percent, kernel_cpu_percent) = match previous {
        Some(prev) => {
            let system_delta = delta(current.system_cpu_usage, prev.system_cpu_usage);
            (
                cpu_percent(
                    delta(current.cpu_usage_user, prev.cpu_usage_user),
                    system_delta,
                    current.per_cpu_count,
                ),
                cpu_percent(
                    delta(current.cpu_usage_kernel, prev.cpu_usage_kernel),
                    system_delta,
                    current.per_cpu_count,
                ),
            )
        }
        None => (0.0, 0.0),
    };

    let memory_percent = match memory_percent(current.memory_usage, current.memory_limit) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::debug!(kind = e.kind(), error = %e, "memory percent unavailable");
            None
        }
    };

    let (network_rx_delta, network_tx_delta) = network_delta(previous, current);

    DerivedMetrics {
        user_cpu_percent,
        kernel_cpu_percent,
        memory_used: current.memory_usage,
        memory_limit: current.memory_limit,
        memory_percent,
        network_rx_delta,
        network_tx_delta,
        io_bytes: reduce_block_io(&current.io_service_bytes),
        io_ops: reduce_block_io(&current.io_serviced),
        timestamp,
    }
}

/// `(component / system) * cpus * 100`, or 0 unless both deltas are positive.
pub fn cpu_percent(component_delta: i64, system_delta: i64, per_cpu_count: u32) -> f64 {
    if system_delta > 0 && component_delta > 0 {
        (component_delta as f64 / system_delta as f64) * per_cpu_count as f64 * 100.0
    } else {
        0.0
    }
}

pub fn memory_percent(usage: u64, limit: u64) -> Result<f64, ComputationError> {
    if limit == 0 {
        return Err(ComputationError::ZeroMemoryLimit { usage });
    }
    Ok(usage as f64 / limit as f64 * 100.0)
}

/// `(rx, tx)` change in summed interface counters. A sample without network data yields 0.
pub fn network_delta(previous: Option<&RawStatSample>, current: &RawStatSample) -> (i64, i64) {
    let Some((rx, tx)) = current.network.totals() else {
        return (0, 0);
    };
    let (prev_rx, prev_tx) = previous
        .and_then(|p| p.network.totals())
        .unwrap_or((0, 0));
    (delta(rx, prev_rx), delta(tx, prev_tx))
}

/// Folds `{op, value}` entries into per-class counters. Classes match case-insensitively
/// (cgroup v1 reports `Read`, v2 `read`); a repeated class keeps the last value seen.
pub fn reduce_block_io(entries: &[BlkioEntry]) -> IoCounters {
    let by_class: BTreeMap<String, u64> = entries
        .iter()
        .map(|e| (e.op.to_ascii_lowercase(), e.value))
        .collect();
    let get = |class: &str| by_class.get(class).copied().unwrap_or(0);
    IoCounters {
        read: get("read"),
        write: get("write"),
        sync: get("sync"),
        async_: get("async"),
        total: get("total"),
    }
}

fn delta(current: u64, previous: u64) -> i64 {
    current as i64 - previous as i64
}
