// Optional DockerRuntime tests when a Docker daemon is available

use docker_zabbix_sender::error::RuntimeError;
use docker_zabbix_sender::runtime::{DockerRuntime, RuntimeClient};
use futures_util::StreamExt;
use std::time::Duration;

async fn connect() -> Option<DockerRuntime> {
    let runtime = DockerRuntime::connect(None, true).ok()?;
    // Skip when Docker is not available (e.g. CI without Docker)
    runtime.ping().await.ok()?;
    Some(runtime)
}

#[tokio::test]
async fn docker_runtime_lists_containers() {
    let Some(runtime) = connect().await else {
        return;
    };
    let running = runtime.list_running().await.expect("list_running");
    let all = runtime.list_all().await.expect("list_all");
    assert!(running.iter().all(|id| all.iter().any(|c| &c.id == id)));
}

#[tokio::test]
async fn docker_runtime_reads_a_sample_from_a_running_container() {
    let Some(runtime) = connect().await else {
        return;
    };
    let running = runtime.list_running().await.expect("list_running");
    let Some(id) = running.into_iter().next() else {
        return;
    };

    let details = runtime.inspect(&id).await.expect("inspect");
    assert!(!details.display_name.starts_with('/'));

    let mut stream = runtime.open_stats_stream(&id).await.expect("open stream");
    let first = tokio::time::timeout(Duration::from_secs(10), stream.next())
        .await
        .expect("first sample in time");
    if let Some(Ok(sample)) = first {
        assert!(sample.per_cpu_count >= 1);
    }
}

#[tokio::test]
async fn docker_runtime_reports_unknown_container_as_not_found() {
    let Some(runtime) = connect().await else {
        return;
    };
    let err = runtime
        .inspect("docker-zabbix-sender-no-such-container")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NotFound(_)));
}
