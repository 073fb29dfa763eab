// Domain models

mod event;
mod metrics;
mod sample;

pub use event::{Event, MetricValue};
pub use metrics::{ContainerSnapshot, DerivedMetrics, IoCounters};
pub use sample::{BlkioEntry, ContainerId, InterfaceCounters, NetworkCounters, RawStatSample};
