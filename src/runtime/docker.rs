// Docker runtime client via bollard

use super::convert::raw_sample_from_docker;
use super::{ContainerDetails, ContainerSummary, RuntimeClient, StatsStream};
use crate::error::RuntimeError;
use crate::models::ContainerId;
use bollard::Docker;
use bollard::errors::Error as DockerError;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, instrument};

const CONNECT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

/// How [`DockerRuntime::connect`] reaches the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport<'a> {
    /// `DOCKER_HOST`, `DOCKER_TLS_VERIFY` and `DOCKER_CERT_PATH` from the environment.
    Environment,
    Unix(&'a str),
    Ssl(&'a str),
    /// Plaintext, only for an explicit `http://` endpoint.
    Http(&'a str),
}

fn transport(endpoint: Option<&str>, tls_verify: bool) -> Result<Transport<'_>, RuntimeError> {
    match endpoint {
        None => Ok(Transport::Environment),
        Some(ep) if ep.starts_with("unix://") || ep.starts_with('/') => Ok(Transport::Unix(ep)),
        Some(ep) if ep.starts_with("http://") => Ok(Transport::Http(ep)),
        Some(ep) if tls_verify => Ok(Transport::Ssl(ep)),
        // TLS without certificate verification is not available; never fall back to plaintext.
        Some(ep) => Err(RuntimeError::Connection(format!(
            "{ep}: TLS verification cannot be turned off, use http:// for a plaintext daemon"
        ))),
    }
}

impl DockerRuntime {
    /// Connects to `endpoint` (`unix:///path`, a bare socket path, `tcp://host:port`,
    /// `https://host:port` or `http://host:port`).
    ///
    /// Without an endpoint the environment decides, as the docker CLI does: `DOCKER_HOST`
    /// (socket, `tcp://` or `https://`), with TLS when `DOCKER_TLS_VERIFY` is set. TCP
    /// endpoints use TLS with the key, certificate and CA found in `DOCKER_CERT_PATH`
    /// (default `~/.docker`); only `http://` is plaintext.
    pub fn connect(endpoint: Option<&str>, tls_verify: bool) -> Result<Self, RuntimeError> {
        let version = bollard::API_DEFAULT_VERSION;
        let docker = match transport(endpoint, tls_verify)? {
            Transport::Environment => Docker::connect_with_defaults(),
            Transport::Unix(ep) => Docker::connect_with_unix(ep, CONNECT_TIMEOUT_SECS, version),
            Transport::Ssl(ep) => {
                let certs = cert_dir();
                Docker::connect_with_ssl(
                    ep,
                    &certs.join("key.pem"),
                    &certs.join("cert.pem"),
                    &certs.join("ca.pem"),
                    CONNECT_TIMEOUT_SECS,
                    version,
                )
            }
            Transport::Http(ep) => Docker::connect_with_http(ep, CONNECT_TIMEOUT_SECS, version),
        }
        .map_err(|e| RuntimeError::Connection(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Round-trips to the daemon so startup fails fast on a bad endpoint.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Connection(e.to_string()))
    }

    async fn running_ids(&self) -> Result<HashSet<ContainerId>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(filter))
            .await
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn all_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let filter = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(filter))
            .await
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;
        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerSummary {
                    id: c.id?,
                    status: c.status.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn details(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error(id, e))?;

        let display_name = info
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.to_string());
        let ip_address = info
            .network_settings
            .and_then(|ns| ns.networks)
            .and_then(|nets| {
                nets.into_values()
                    .filter_map(|ep| ep.ip_address)
                    .find(|ip| !ip.is_empty())
            });

        Ok(ContainerDetails {
            display_name,
            ip_address,
        })
    }

    #[instrument(skip(self), fields(runtime = "docker", operation = "open_stats_stream"))]
    async fn stats_stream(&self, id: &str) -> Result<StatsStream, RuntimeError> {
        let options = StatsOptions {
            stream: true,
            ..Default::default()
        };
        let owned_id = id.to_string();
        let mut stream = self
            .docker
            .stats(id, Some(options))
            .map(move |item| {
                item.map(|s| raw_sample_from_docker(&s))
                    .map_err(|e| map_stream_error(&owned_id, e))
            })
            .boxed();

        // The request is lazy: pull the first record so a dead container or an unreachable
        // daemon surfaces here instead of as an immediately-ending stream.
        match stream.next().await {
            Some(Ok(first)) => {
                debug!(container_id = %id, "stats stream opened");
                Ok(stream::once(async move { Ok(first) }).chain(stream).boxed())
            }
            Some(Err(RuntimeError::Stream(msg))) => Err(RuntimeError::Connection(msg)),
            Some(Err(e)) => Err(e),
            None => Ok(stream::empty().boxed()),
        }
    }
}

impl RuntimeClient for DockerRuntime {
    fn list_running(&self) -> BoxFuture<'_, Result<HashSet<ContainerId>, RuntimeError>> {
        self.running_ids().boxed()
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, RuntimeError>> {
        self.all_containers().boxed()
    }

    fn inspect<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>> {
        self.details(id).boxed()
    }

    fn open_stats_stream<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<StatsStream, RuntimeError>> {
        self.stats_stream(id).boxed()
    }
}

fn cert_dir() -> PathBuf {
    std::env::var_os("DOCKER_CERT_PATH")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".docker")))
        .unwrap_or_else(|| PathBuf::from(".docker"))
}

fn map_error(id: &str, e: DockerError) -> RuntimeError {
    match e {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(id.to_string()),
        other => RuntimeError::Connection(other.to_string()),
    }
}

fn map_stream_error(id: &str, e: DockerError) -> RuntimeError {
    match e {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(id.to_string()),
        other => RuntimeError::Stream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_defers_to_the_environment() {
        assert_eq!(transport(None, true).unwrap(), Transport::Environment);
        assert_eq!(transport(None, false).unwrap(), Transport::Environment);
    }

    #[test]
    fn socket_endpoints_use_unix() {
        assert_eq!(
            transport(Some("unix:///var/run/docker.sock"), true).unwrap(),
            Transport::Unix("unix:///var/run/docker.sock")
        );
        assert_eq!(
            transport(Some("/run/docker.sock"), false).unwrap(),
            Transport::Unix("/run/docker.sock")
        );
    }

    #[test]
    fn tcp_endpoints_use_tls() {
        assert_eq!(
            transport(Some("tcp://docker01:2376"), true).unwrap(),
            Transport::Ssl("tcp://docker01:2376")
        );
        assert_eq!(
            transport(Some("https://docker01:2376"), true).unwrap(),
            Transport::Ssl("https://docker01:2376")
        );
    }

    #[test]
    fn tcp_without_verification_is_rejected_not_downgraded() {
        let err = transport(Some("tcp://docker01:2376"), false).unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn explicit_http_is_plaintext() {
        assert_eq!(
            transport(Some("http://docker01:2375"), true).unwrap(),
            Transport::Http("http://docker01:2375")
        );
        assert_eq!(
            transport(Some("http://docker01:2375"), false).unwrap(),
            Transport::Http("http://docker01:2375")
        );
    }
}
