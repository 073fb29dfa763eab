// Container runtime client seam. `DockerRuntime` talks to a real daemon; tests plug in fakes.

mod convert;
mod docker;

pub use convert::raw_sample_from_docker;
pub use docker::DockerRuntime;

use crate::error::RuntimeError;
use crate::models::{ContainerId, RawStatSample};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use std::collections::HashSet;

/// Live, non-restartable sequence of samples for one container. Dropping it releases the connection.
pub type StatsStream = BoxStream<'static, Result<RawStatSample, RuntimeError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub display_name: String,
    pub ip_address: Option<String>,
}

/// Entry of a listing that includes stopped containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Human status as reported by the runtime, e.g. `Up 3 hours` or `Exited (0) 2 days ago`.
    pub status: String,
}

pub trait RuntimeClient: Send + Sync {
    /// Ids of every running container.
    fn list_running(&self) -> BoxFuture<'_, Result<HashSet<ContainerId>, RuntimeError>>;

    /// Every container, running or not.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, RuntimeError>>;

    /// Fails with [`RuntimeError::NotFound`] if the container disappeared since it was listed.
    fn inspect<'a>(&'a self, id: &'a str)
    -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>>;

    fn open_stats_stream<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<StatsStream, RuntimeError>>;
}
