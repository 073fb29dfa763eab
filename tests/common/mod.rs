// Shared test helpers: scripted runtime, recording sink, deterministic clock.
#![allow(dead_code)]

use docker_zabbix_sender::collector::Clock;
use docker_zabbix_sender::error::{RuntimeError, SinkError};
use docker_zabbix_sender::models::{
    ContainerId, ContainerSnapshot, InterfaceCounters, NetworkCounters, RawStatSample,
};
use docker_zabbix_sender::runtime::{
    ContainerDetails, ContainerSummary, RuntimeClient, StatsStream,
};
use docker_zabbix_sender::sink::Sink;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

pub fn sample(user: u64, kernel: u64, system: u64, rx: u64, tx: u64) -> RawStatSample {
    RawStatSample {
        cpu_usage_user: user,
        cpu_usage_kernel: kernel,
        cpu_usage_total: user + kernel,
        system_cpu_usage: system,
        per_cpu_count: 2,
        memory_usage: 256,
        memory_limit: 1024,
        network: NetworkCounters::Interfaces(
            [(
                "eth0".to_string(),
                InterfaceCounters {
                    rx_bytes: rx,
                    tx_bytes: tx,
                },
            )]
            .into_iter()
            .collect(),
        ),
        ..Default::default()
    }
}

/// Three samples: user 100/200/400, kernel 50/100/200, system 1000/2000/3000, rx 1000/1500/2500,
/// tx 10/20/50, on 2 CPUs. After the third: user 40%, kernel 20%, rx delta 1000, tx delta 30.
pub fn three_samples() -> Vec<RawStatSample> {
    vec![
        sample(100, 50, 1_000, 1_000, 10),
        sample(200, 100, 2_000, 1_500, 20),
        sample(400, 200, 3_000, 2_500, 50),
    ]
}

#[derive(Clone)]
pub struct FakeContainer {
    pub name: String,
    pub status: String,
    pub ip: Option<String>,
    pub samples: Vec<RawStatSample>,
    /// Keep the stream open after the scripted samples instead of ending it.
    pub keep_open: bool,
    pub fail_open: bool,
    /// Report the container as gone when its stream is opened.
    pub vanish_on_open: bool,
    /// Read error delivered after the scripted samples, ending the stream.
    pub stream_error: Option<String>,
}

impl FakeContainer {
    pub fn new(name: &str, samples: Vec<RawStatSample>) -> Self {
        Self {
            name: name.to_string(),
            status: "Up 2 minutes".to_string(),
            ip: Some("172.17.0.2".to_string()),
            samples,
            keep_open: true,
            fail_open: false,
            vanish_on_open: false,
            stream_error: None,
        }
    }

    pub fn ending(mut self) -> Self {
        self.keep_open = false;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn vanishing_on_open(mut self) -> Self {
        self.vanish_on_open = true;
        self
    }

    pub fn breaking_mid_stream(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    running: Mutex<HashSet<ContainerId>>,
    containers: Mutex<HashMap<ContainerId, FakeContainer>>,
    stopped: Mutex<Vec<ContainerSummary>>,
    open: Arc<Mutex<HashMap<ContainerId, usize>>>,
    opened: Mutex<HashMap<ContainerId, usize>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `container` under `id` and marks it running.
    pub fn add(&self, id: &str, container: FakeContainer) {
        self.containers
            .lock()
            .unwrap()
            .insert(id.to_string(), container);
        self.running.lock().unwrap().insert(id.to_string());
    }

    pub fn add_stopped(&self, id: &str, status: &str) {
        self.stopped.lock().unwrap().push(ContainerSummary {
            id: id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn set_running(&self, ids: &[&str]) {
        *self.running.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    /// Forgets the container entirely, so inspection reports not found.
    pub fn remove(&self, id: &str) {
        self.containers.lock().unwrap().remove(id);
        self.running.lock().unwrap().remove(id);
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut FakeContainer)) {
        if let Some(c) = self.containers.lock().unwrap().get_mut(id) {
            f(c);
        }
    }

    pub fn running_set(&self) -> HashSet<ContainerId> {
        self.running.lock().unwrap().clone()
    }

    /// Stream handles currently held by collectors.
    pub fn open_streams(&self) -> usize {
        self.open.lock().unwrap().values().sum()
    }

    pub fn open_streams_for(&self, id: &str) -> usize {
        self.open.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Streams ever opened for `id`.
    pub fn opened_for(&self, id: &str) -> usize {
        self.opened.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn container(&self, id: &str) -> Result<FakeContainer, RuntimeError> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }
}

impl RuntimeClient for FakeRuntime {
    fn list_running(&self) -> BoxFuture<'_, Result<HashSet<ContainerId>, RuntimeError>> {
        let running = self.running_set();
        async move { Ok(running) }.boxed()
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, RuntimeError>> {
        let mut all: Vec<ContainerSummary> = self
            .containers
            .lock()
            .unwrap()
            .iter()
            .map(|(id, c)| ContainerSummary {
                id: id.clone(),
                status: c.status.clone(),
            })
            .collect();
        all.extend(self.stopped.lock().unwrap().iter().cloned());
        async move { Ok(all) }.boxed()
    }

    fn inspect<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>> {
        let details = self.container(id).map(|c| ContainerDetails {
            display_name: c.name,
            ip_address: c.ip,
        });
        async move { details }.boxed()
    }

    fn open_stats_stream<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<StatsStream, RuntimeError>> {
        let result = self.container(id).and_then(|c| {
            if c.fail_open {
                return Err(RuntimeError::Connection(format!("cannot stream {id}")));
            }
            if c.vanish_on_open {
                return Err(RuntimeError::NotFound(id.to_string()));
            }
            *self.opened.lock().unwrap().entry(id.to_string()).or_default() += 1;
            *self.open.lock().unwrap().entry(id.to_string()).or_default() += 1;
            let tail = match (c.stream_error, c.keep_open) {
                (Some(message), _) => stream::once(async move {
                    Err::<RawStatSample, _>(RuntimeError::Stream(message))
                })
                .boxed(),
                (None, true) => stream::pending().boxed(),
                (None, false) => stream::empty().boxed(),
            };
            let inner = stream::iter(c.samples.into_iter().map(Ok)).chain(tail).boxed();
            let tracked = TrackedStream {
                inner,
                _guard: OpenGuard {
                    open: self.open.clone(),
                    id: id.to_string(),
                },
            };
            Ok(tracked.boxed())
        });
        async move { result }.boxed()
    }
}

struct OpenGuard {
    open: Arc<Mutex<HashMap<ContainerId, usize>>>,
    id: ContainerId,
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        if let Some(n) = self.open.lock().unwrap().get_mut(&self.id) {
            *n -= 1;
        }
    }
}

struct TrackedStream {
    inner: StatsStream,
    _guard: OpenGuard,
}

impl Stream for TrackedStream {
    type Item = Result<RawStatSample, RuntimeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Every call advances the clock by one second, starting at `start`.
pub struct TickClock(AtomicI64);

impl TickClock {
    pub fn new(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }
}

impl Clock for TickClock {
    fn now(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Sink that keeps every batch and notes how many streams were still open when it was closed.
#[derive(Clone)]
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<Vec<ContainerSnapshot>>>>,
    pub closes: Arc<AtomicUsize>,
    pub open_streams_at_close: Arc<Mutex<Option<usize>>>,
    runtime: Arc<FakeRuntime>,
    fail_forward: bool,
}

impl RecordingSink {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            batches: Arc::default(),
            closes: Arc::default(),
            open_streams_at_close: Arc::default(),
            runtime,
            fail_forward: false,
        }
    }

    /// Records batches but reports every forward as failed.
    pub fn failing(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            fail_forward: true,
            ..Self::new(runtime)
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn last_batch(&self) -> Option<Vec<ContainerSnapshot>> {
        self.batches.lock().unwrap().last().cloned()
    }
}

impl Sink for RecordingSink {
    fn forward<'a>(
        &'a mut self,
        _runtime: &'a dyn RuntimeClient,
        batch: Vec<ContainerSnapshot>,
    ) -> BoxFuture<'a, Result<(), SinkError>> {
        self.batches.lock().unwrap().push(batch);
        let result = if self.fail_forward {
            Err(SinkError::Io(std::io::Error::other("sink unavailable")))
        } else {
            Ok(())
        };
        async move { result }.boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), SinkError>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.open_streams_at_close.lock().unwrap() = Some(self.runtime.open_streams());
        async { Ok(()) }.boxed()
    }
}

/// Polls `cond` every 10ms until it holds; panics after `timeout`.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
