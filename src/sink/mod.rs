// Metrics sinks: translate batches to events and hand them to a writer.

pub mod producers;
mod stdout;
mod translate;
pub mod zabbix;

pub use producers::{MetricProducer, default_producers};
pub use stdout::StdoutWriter;
pub use translate::{CONTAINER_DOMAIN, EVENT_KEY_PREFIX, EventTranslator, container_hostname};
pub use zabbix::{ZabbixSenderOptions, ZabbixSenderWriter};

use crate::error::SinkError;
use crate::models::{ContainerSnapshot, Event};
use crate::runtime::RuntimeClient;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

/// Consumer of the emitter's per-tick batches.
pub trait Sink: Send {
    /// An empty batch is a successful no-op.
    fn forward<'a>(
        &'a mut self,
        runtime: &'a dyn RuntimeClient,
        batch: Vec<ContainerSnapshot>,
    ) -> BoxFuture<'a, Result<(), SinkError>>;

    /// Called exactly once, after every collector has been torn down.
    fn close(&mut self) -> BoxFuture<'_, Result<(), SinkError>> {
        async { Ok(()) }.boxed()
    }
}

/// Destination for rendered events.
pub trait EventWriter: Send {
    fn write_events<'a>(&'a mut self, events: &'a [Event]) -> BoxFuture<'a, Result<(), SinkError>>;

    fn close(&mut self) -> BoxFuture<'_, Result<(), SinkError>> {
        async { Ok(()) }.boxed()
    }
}

/// [`Sink`] that translates each batch (plus enrichment events) and writes it out.
pub struct EventSink<W> {
    translator: EventTranslator,
    writer: W,
}

impl<W: EventWriter> EventSink<W> {
    pub fn new(translator: EventTranslator, writer: W) -> Self {
        Self { translator, writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: EventWriter> Sink for EventSink<W> {
    fn forward<'a>(
        &'a mut self,
        runtime: &'a dyn RuntimeClient,
        batch: Vec<ContainerSnapshot>,
    ) -> BoxFuture<'a, Result<(), SinkError>> {
        async move {
            if batch.is_empty() {
                return Ok(());
            }
            let events = self.translator.translate(runtime, &batch).await;
            tracing::debug!(
                containers = batch.len(),
                events = events.len(),
                "forwarding events"
            );
            self.writer.write_events(&events).await
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), SinkError>> {
        self.writer.close()
    }
}
