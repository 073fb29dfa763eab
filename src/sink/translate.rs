// Batch -> events translation and enrichment

use super::producers::MetricProducer;
use crate::models::{ContainerSnapshot, Event, MetricValue};
use crate::runtime::RuntimeClient;
use tracing::warn;

pub const EVENT_KEY_PREFIX: &str = "docker.container.";

/// Middle label of container hostnames.
pub const CONTAINER_DOMAIN: &str = "docker";

/// `{container_name}.docker.{host_fqdn}`
pub fn container_hostname(host_fqdn: &str, container_name: &str) -> String {
    format!("{container_name}.{CONTAINER_DOMAIN}.{host_fqdn}")
}

pub struct EventTranslator {
    host_fqdn: String,
    producers: Vec<Box<dyn MetricProducer>>,
}

impl EventTranslator {
    pub fn new(host_fqdn: impl Into<String>, producers: Vec<Box<dyn MetricProducer>>) -> Self {
        Self {
            host_fqdn: host_fqdn.into(),
            producers,
        }
    }

    /// Core metric events followed by every producer's events.
    pub async fn translate(
        &self,
        runtime: &dyn RuntimeClient,
        batch: &[ContainerSnapshot],
    ) -> Vec<Event> {
        let mut events = self.metrics_to_events(batch);
        self.enrich(runtime, batch, &mut events).await;
        events
    }

    /// One event per metric per container. Name, timestamp and the raw sample are never
    /// emitted as keys; an unavailable memory percentage is skipped.
    pub fn metrics_to_events(&self, batch: &[ContainerSnapshot]) -> Vec<Event> {
        let mut events = Vec::with_capacity(batch.len() * 20);
        for snap in batch {
            let hostname = container_hostname(&self.host_fqdn, &snap.name);
            let m = &snap.metrics;
            let mut fields: Vec<(&str, MetricValue)> = vec![
                ("id", MetricValue::from(snap.id.clone())),
                ("cpu.user_percent", MetricValue::from(m.user_cpu_percent)),
                ("cpu.kernel_percent", MetricValue::from(m.kernel_cpu_percent)),
                ("memory.used", MetricValue::from(m.memory_used)),
                ("memory.limit", MetricValue::from(m.memory_limit)),
            ];
            if let Some(p) = m.memory_percent {
                fields.push(("memory.percent", MetricValue::from(p)));
            }
            fields.extend([
                ("network_rx", MetricValue::from(m.network_rx_delta)),
                ("network_tx", MetricValue::from(m.network_tx_delta)),
                ("io_bytes_read", MetricValue::from(m.io_bytes.read)),
                ("io_bytes_write", MetricValue::from(m.io_bytes.write)),
                ("io_bytes_sync", MetricValue::from(m.io_bytes.sync)),
                ("io_bytes_async", MetricValue::from(m.io_bytes.async_)),
                ("io_bytes_total", MetricValue::from(m.io_bytes.total)),
                ("io_operations_read", MetricValue::from(m.io_ops.read)),
                ("io_operations_write", MetricValue::from(m.io_ops.write)),
                ("io_operations_sync", MetricValue::from(m.io_ops.sync)),
                ("io_operations_async", MetricValue::from(m.io_ops.async_)),
                ("io_operations_total", MetricValue::from(m.io_ops.total)),
            ]);
            events.extend(fields.into_iter().map(|(key, value)| Event {
                hostname: hostname.clone(),
                timestamp: m.timestamp,
                key: format!("{EVENT_KEY_PREFIX}{key}"),
                value,
            }));
        }
        events
    }

    /// Runs every producer; a failing producer is logged and skipped.
    pub async fn enrich(
        &self,
        runtime: &dyn RuntimeClient,
        batch: &[ContainerSnapshot],
        events: &mut Vec<Event>,
    ) {
        for producer in &self.producers {
            match producer.produce(&self.host_fqdn, runtime, batch).await {
                Ok(extra) => events.extend(extra),
                Err(e) => warn!(
                    kind = "producer",
                    producer = producer.name(),
                    error = %e,
                    "could not collect metrics from producer"
                ),
            }
        }
    }
}
