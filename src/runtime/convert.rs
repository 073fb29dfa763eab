// Decode a raw Docker stats API response into a RawStatSample.

use crate::models::{BlkioEntry, InterfaceCounters, NetworkCounters, RawStatSample};
use bollard::models::{ContainerBlkioStatEntry, ContainerStatsResponse};

pub fn raw_sample_from_docker(s: &ContainerStatsResponse) -> RawStatSample {
    let cpu_stats = s.cpu_stats.as_ref();
    let cpu_usage = cpu_stats.and_then(|c| c.cpu_usage.as_ref());

    // cgroup v2 hosts no longer report percpu_usage; online_cpus carries the same count there.
    let per_cpu_count = cpu_usage
        .and_then(|u| u.percpu_usage.as_ref())
        .map(|p| p.len() as u32)
        .filter(|n| *n > 0)
        .or_else(|| cpu_stats.and_then(|c| c.online_cpus))
        .unwrap_or(1);

    let network = s.networks.as_ref().map_or(NetworkCounters::Absent, |n| {
        NetworkCounters::Interfaces(
            n.iter()
                .map(|(name, v)| {
                    (
                        name.clone(),
                        InterfaceCounters {
                            rx_bytes: v.rx_bytes.unwrap_or(0),
                            tx_bytes: v.tx_bytes.unwrap_or(0),
                        },
                    )
                })
                .collect(),
        )
    });

    let blkio = s.blkio_stats.as_ref();

    RawStatSample {
        cpu_usage_user: cpu_usage.and_then(|u| u.usage_in_usermode).unwrap_or(0),
        cpu_usage_kernel: cpu_usage.and_then(|u| u.usage_in_kernelmode).unwrap_or(0),
        cpu_usage_total: cpu_usage.and_then(|u| u.total_usage).unwrap_or(0),
        system_cpu_usage: cpu_stats.and_then(|c| c.system_cpu_usage).unwrap_or(0),
        per_cpu_count,
        memory_usage: s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0),
        memory_limit: s.memory_stats.as_ref().and_then(|m| m.limit).unwrap_or(0),
        network,
        io_service_bytes: blkio_entries(blkio.and_then(|b| b.io_service_bytes_recursive.as_ref())),
        io_serviced: blkio_entries(blkio.and_then(|b| b.io_serviced_recursive.as_ref())),
    }
}

fn blkio_entries(entries: Option<&Vec<ContainerBlkioStatEntry>>) -> Vec<BlkioEntry> {
    entries
        .map(|b| {
            b.iter()
                .filter_map(|e| Some(BlkioEntry::new(e.op.clone()?, e.value.unwrap_or(0))))
                .collect()
        })
        .unwrap_or_default()
}
