// Fan-in of every collector's latest metrics into one batch.

use crate::collector::CollectorRegistry;
use crate::models::ContainerSnapshot;

/// Reads each tracked collector's state under its own lock. There is no lock across the whole
/// pass; collectors that have not processed a sample yet are left out.
pub async fn snapshot_all(registry: &CollectorRegistry) -> Vec<ContainerSnapshot> {
    let mut batch = Vec::with_capacity(registry.len());
    for handle in registry.handles() {
        let state = handle.state();
        let Some(latest) = state.read().await else {
            continue;
        };
        batch.push(ContainerSnapshot {
            id: state.id().to_string(),
            name: state.display_name().unwrap_or(state.id()).to_string(),
            metrics: latest.metrics,
            sample: latest.sample,
        });
    }
    batch
}
