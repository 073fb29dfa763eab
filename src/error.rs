// Error taxonomy. Every variant carries a stable `kind()` tag used as a log field.

use crate::models::ContainerId;

/// Failures reported by a container runtime client.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container {0} not found")]
    NotFound(ContainerId),
    #[error("runtime unreachable: {0}")]
    Connection(String),
    #[error("stats stream interrupted: {0}")]
    Stream(String),
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::NotFound(_) => "not_found",
            RuntimeError::Connection(_) => "connection",
            RuntimeError::Stream(_) => "stream",
        }
    }
}

/// Reasons a collector never reached streaming.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("could not open stats stream for container {id}: {source}")]
    Connection {
        id: ContainerId,
        #[source]
        source: RuntimeError,
    },
    #[error("could not inspect container {id}: {source}")]
    Inspect {
        id: ContainerId,
        #[source]
        source: RuntimeError,
    },
}

impl CollectorError {
    pub fn kind(&self) -> &'static str {
        match self {
            CollectorError::Connection { .. } => "connection",
            CollectorError::Inspect { .. } => "inspect",
        }
    }
}

/// A metric that could not be derived from one sample.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputationError {
    #[error("memory limit is zero (usage {usage})")]
    ZeroMemoryLimit { usage: u64 },
}

impl ComputationError {
    pub fn kind(&self) -> &'static str {
        "computation"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink already closed")]
    Closed,
}

impl SinkError {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Spawn { .. } => "sink_spawn",
            SinkError::Io(_) => "sink_io",
            SinkError::Closed => "sink_closed",
        }
    }
}
