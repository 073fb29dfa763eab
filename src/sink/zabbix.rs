// zabbix_sender child process fed through its stdin.

use super::EventWriter;
use crate::error::SinkError;
use crate::models::Event;
use anyhow::Context;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

pub const SENDER_PROGRAM: &str = "zabbix_sender";

/// Command-line options passed through to `zabbix_sender`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZabbixSenderOptions {
    pub agent_config: Option<PathBuf>,
    pub zabbix_server: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub real_time: bool,
    pub verbose: u8,
}

impl ZabbixSenderOptions {
    /// Arguments after the program name. Input is always stdin, with timestamps.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--input-file".to_string(),
            "-".to_string(),
            "--with-timestamps".to_string(),
        ];
        if let Some(config) = &self.agent_config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        if let Some(server) = &self.zabbix_server {
            args.push("--zabbix-server".to_string());
            args.push(server.clone());
        }
        if let Some(host) = &self.host {
            args.push("--host".to_string());
            args.push(host.clone());
        }
        if let Some(port) = self.port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        if self.real_time {
            args.push("--real-time".to_string());
        }
        if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.verbose as usize)));
        }
        args
    }

    /// Host the events are reported under: the explicit `host`, else the one named in the
    /// agent configuration.
    pub fn resolve_host(&self) -> anyhow::Result<String> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let config = self
            .agent_config
            .as_deref()
            .context("needs either a host or a zabbix agent configuration file")?;
        hostname_from_agent_config(config)
    }
}

/// Reads `Hostname`, or failing that `HostnameItem`, from a zabbix agent configuration file.
pub fn hostname_from_agent_config(path: &Path) -> anyhow::Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading zabbix agent configuration {}", path.display()))?;
    parse_agent_hostname(&contents).with_context(|| {
        format!(
            "couldn't find either 'Hostname' or 'HostnameItem' in configuration file: {}",
            path.display()
        )
    })
}

pub fn parse_agent_hostname(contents: &str) -> Option<String> {
    let lookup = |wanted: &str| {
        contents.lines().find_map(|line| {
            let line = line.trim();
            if line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            (key.trim() == wanted)
                .then(|| value.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    };
    lookup("Hostname").or_else(|| lookup("HostnameItem"))
}

pub struct ZabbixSenderWriter {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ZabbixSenderWriter {
    pub fn spawn(options: &ZabbixSenderOptions) -> Result<Self, SinkError> {
        Self::spawn_program(SENDER_PROGRAM, options)
    }

    /// Like [`ZabbixSenderWriter::spawn`] with another executable in place of `zabbix_sender`.
    pub fn spawn_program(program: &str, options: &ZabbixSenderOptions) -> Result<Self, SinkError> {
        let args = options.args();
        debug!(program, ?args, "starting sender process");
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let stdin = child.stdin.take();
        Ok(Self { child, stdin })
    }

    async fn write_lines(&mut self, events: &[Event]) -> Result<(), SinkError> {
        let stdin = self.stdin.as_mut().ok_or(SinkError::Closed)?;
        let payload: String = events.iter().map(Event::sender_line).collect();
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        // Closing stdin is what makes zabbix_sender flush and exit.
        drop(self.stdin.take());
        let status = self.child.wait().await?;
        if status.success() {
            info!("sender process exited");
        } else {
            warn!(%status, kind = "sink_exit", "sender process exited with failure");
        }
        Ok(())
    }
}

impl EventWriter for ZabbixSenderWriter {
    fn write_events<'a>(&'a mut self, events: &'a [Event]) -> BoxFuture<'a, Result<(), SinkError>> {
        self.write_lines(events).boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), SinkError>> {
        self.finish().boxed()
    }
}
