use anyhow::Result;
use clap::Parser;
use docker_zabbix_sender::collector::SystemClock;
use docker_zabbix_sender::config::AppConfig;
use docker_zabbix_sender::emitter::{self, Emitter};
use docker_zabbix_sender::runtime::DockerRuntime;
use docker_zabbix_sender::sink::{
    EventSink, EventTranslator, Sink, StdoutWriter, ZabbixSenderWriter, default_producers,
};
use docker_zabbix_sender::version;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Provides Zabbix Docker containers statistics running on a Docker daemon.
#[derive(Parser, Debug)]
#[command(name = "docker-zabbix-sender")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to $CONFIG_FILE when set)
    #[arg(long)]
    config_file: Option<String>,

    /// Docker daemon endpoint, e.g. unix:///var/run/docker.sock or tcp://host:2376
    /// (defaults to $DOCKER_HOST)
    #[arg(long)]
    docker_host: Option<String>,

    /// Use TLS and verify the remote Docker daemon; tcp:// endpoints require it
    #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
    tlsverify: Option<bool>,

    /// Absolute path to the zabbix agent configuration file
    #[arg(short = 'c', long = "config")]
    agent_config: Option<String>,

    /// Hostname or IP address of Zabbix server (defaults to $ZABBIX_SERVER)
    #[arg(short = 'z', long)]
    zabbix_server: Option<String>,

    /// Port number of the server trapper running on the server
    #[arg(short, long)]
    port: Option<u16>,

    /// Zabbix update interval in seconds [default: 30]
    #[arg(short, long)]
    interval: Option<u64>,

    /// zabbix_sender pushes metrics one by one as soon as they are sent
    #[arg(short, long)]
    real_time: bool,

    /// Host name the events are reported under (defaults to $ZABBIX_HOST)
    #[arg(short = 's', long)]
    host: Option<String>,

    /// Print events to stdout instead of running zabbix_sender
    #[arg(long)]
    dry_run: bool,

    /// Verbose mode, -vv for more details
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.docker_host {
            config.docker.endpoint = Some(endpoint.clone());
        }
        if let Some(tls_verify) = self.tlsverify {
            config.docker.tls_verify = tls_verify;
        }
        if let Some(interval) = self.interval {
            config.emitter.interval_secs = interval;
        }
        let zabbix = &mut config.zabbix;
        if self.agent_config.is_some() {
            zabbix.agent_config = self.agent_config.clone();
        }
        if self.zabbix_server.is_some() {
            zabbix.server = self.zabbix_server.clone();
        }
        if self.port.is_some() {
            zabbix.port = self.port;
        }
        if self.host.is_some() {
            zabbix.host = self.host.clone();
        }
        zabbix.real_time |= self.real_time;
        zabbix.dry_run |= self.dry_run;
        zabbix.verbose = zabbix.verbose.max(self.verbose);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose > 0 { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();
    tracing::info!("{}", version::banner());

    let mut app_config = AppConfig::load(cli.config_file.as_deref())?;
    cli.apply(&mut app_config);
    app_config.apply_env(|key| std::env::var(key).ok());
    app_config.validate()?;

    let docker = DockerRuntime::connect(
        app_config.docker.endpoint.as_deref(),
        app_config.docker.tls_verify,
    )?;
    docker.ping().await?;
    let runtime = Arc::new(docker);

    let sender_options = app_config.zabbix.sender_options();
    let host_fqdn = match sender_options.resolve_host() {
        Ok(host) => host,
        Err(_) if app_config.zabbix.dry_run => "localhost".to_string(),
        Err(e) => return Err(e),
    };
    let translator = EventTranslator::new(host_fqdn.clone(), default_producers());
    let sink: Box<dyn Sink> = if app_config.zabbix.dry_run {
        Box::new(EventSink::new(translator, StdoutWriter::new()))
    } else {
        Box::new(EventSink::new(
            translator,
            ZabbixSenderWriter::spawn(&sender_options)?,
        ))
    };

    let emitter = Emitter::new(
        runtime,
        sink,
        Arc::new(SystemClock),
        app_config.emitter.interval(),
    );
    let stop = emitter.stop_signal();
    tracing::info!(
        host = %host_fqdn,
        interval_secs = app_config.emitter.interval_secs,
        "starting container stats emitter"
    );
    let emitter_handle = emitter::spawn(emitter);

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal");
    stop.request_stop();
    emitter_handle.await?;
    tracing::info!("collectors terminated successfully");

    Ok(())
}
