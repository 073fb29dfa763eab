// Dry-run writer: prints sender lines instead of shipping them.

use super::EventWriter;
use crate::error::SinkError;
use crate::models::Event;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

pub struct StdoutWriter<W = Stdout> {
    out: W,
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: AsyncWrite + Unpin + Send> StdoutWriter<W> {
    /// Writes to `out` instead of the process stdout.
    pub fn with_output(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    async fn write_lines(&mut self, events: &[Event]) -> Result<(), SinkError> {
        for event in events {
            self.out.write_all(event.sender_line().as_bytes()).await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send> EventWriter for StdoutWriter<W> {
    fn write_events<'a>(&'a mut self, events: &'a [Event]) -> BoxFuture<'a, Result<(), SinkError>> {
        self.write_lines(events).boxed()
    }
}
