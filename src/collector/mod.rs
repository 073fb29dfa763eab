// Per-container stats collection: metric math, shared state, collectors and their registry.

mod container;
mod registry;
mod state;
pub mod stats;

pub use container::{
    Clock, CollectorExit, CollectorHandle, CollectorOutcome, ContainerCollector, SystemClock,
};
pub use registry::{CollectorRegistry, ReconcileReport};
pub use state::{CollectorPhase, CollectorState, LatestSample};
