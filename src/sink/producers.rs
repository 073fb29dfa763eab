// Enrichment producers: extra events computed from the runtime and the current batch.
// Registered statically through `default_producers`.

use super::translate::{EVENT_KEY_PREFIX, container_hostname};
use crate::error::RuntimeError;
use crate::models::{ContainerSnapshot, Event, MetricValue};
use crate::runtime::RuntimeClient;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

/// Hostname that tells zabbix_sender to use its configured default host.
pub const DEFAULT_SENDER_HOST: &str = "-";

pub trait MetricProducer: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn produce<'a>(
        &'a self,
        host_fqdn: &'a str,
        runtime: &'a dyn RuntimeClient,
        batch: &'a [ContainerSnapshot],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Event>>>;
}

pub fn default_producers() -> Vec<Box<dyn MetricProducer>> {
    vec![
        Box::new(ContainerCount),
        Box::new(ContainerIp),
        Box::new(CpuCount),
    ]
}

/// Number of containers known to the runtime: `count.all`, `count.running`, `count.crashed`.
/// A container counts as crashed when it is neither up nor exited with status 0.
pub struct ContainerCount;

impl MetricProducer for ContainerCount {
    fn name(&self) -> &'static str {
        "container-count"
    }

    fn produce<'a>(
        &'a self,
        _host_fqdn: &'a str,
        runtime: &'a dyn RuntimeClient,
        _batch: &'a [ContainerSnapshot],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Event>>> {
        count_events(runtime).boxed()
    }
}

/// IP address of each container in the batch.
pub struct ContainerIp;

impl MetricProducer for ContainerIp {
    fn name(&self) -> &'static str {
        "container-ip"
    }

    fn produce<'a>(
        &'a self,
        host_fqdn: &'a str,
        runtime: &'a dyn RuntimeClient,
        batch: &'a [ContainerSnapshot],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Event>>> {
        ip_events(host_fqdn, runtime, batch).boxed()
    }
}

/// Number of CPUs visible to each container.
pub struct CpuCount;

impl MetricProducer for CpuCount {
    fn name(&self) -> &'static str {
        "cpu-count"
    }

    fn produce<'a>(
        &'a self,
        host_fqdn: &'a str,
        _runtime: &'a dyn RuntimeClient,
        batch: &'a [ContainerSnapshot],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Event>>> {
        let events: Vec<Event> = batch
            .iter()
            .map(|snap| Event {
                hostname: container_hostname(host_fqdn, &snap.name),
                timestamp: snap.metrics.timestamp,
                key: format!("{EVENT_KEY_PREFIX}cpu.count"),
                value: MetricValue::Int(i64::from(snap.sample.per_cpu_count)),
            })
            .collect();
        futures_util::future::ready(Ok(events)).boxed()
    }
}

async fn count_events(runtime: &dyn RuntimeClient) -> anyhow::Result<Vec<Event>> {
    let containers = runtime.list_all().await?;
    let now = chrono::Utc::now().timestamp();
    let running = containers
        .iter()
        .filter(|c| c.status.starts_with("Up"))
        .count();
    let crashed = containers
        .iter()
        .filter(|c| !c.status.starts_with("Up") && !c.status.starts_with("Exited (0)"))
        .count();
    Ok([
        ("all", containers.len()),
        ("running", running),
        ("crashed", crashed),
    ]
    .into_iter()
    .map(|(key, value)| Event {
        hostname: DEFAULT_SENDER_HOST.to_string(),
        timestamp: now,
        key: format!("{EVENT_KEY_PREFIX}count.{key}"),
        value: MetricValue::from(value as u64),
    })
    .collect())
}

async fn ip_events(
    host_fqdn: &str,
    runtime: &dyn RuntimeClient,
    batch: &[ContainerSnapshot],
) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::with_capacity(batch.len());
    for snap in batch {
        let details = match runtime.inspect(&snap.id).await {
            Ok(d) => d,
            // Stopped since the snapshot; the next reconcile drops it.
            Err(RuntimeError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        events.push(Event {
            hostname: container_hostname(host_fqdn, &snap.name),
            timestamp: snap.metrics.timestamp,
            key: format!("{EVENT_KEY_PREFIX}ip"),
            value: MetricValue::Text(details.ip_address.unwrap_or_default()),
        });
    }
    Ok(events)
}
