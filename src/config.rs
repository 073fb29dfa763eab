use crate::sink::ZabbixSenderOptions;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub docker: DockerConfig,
    pub emitter: EmitterConfig,
    pub zabbix: ZabbixConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// `unix:///var/run/docker.sock`, `tcp://host:2376`, ... Local defaults when unset.
    pub endpoint: Option<String>,
    pub tls_verify: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            tls_verify: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Seconds between two batches sent to Zabbix.
    pub interval_secs: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

impl EmitterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ZabbixConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Host name the events are reported under. Read from `agent_config` when unset.
    pub host: Option<String>,
    pub agent_config: Option<String>,
    /// Push events one by one as soon as they are written.
    pub real_time: bool,
    pub verbose: u8,
    /// Print events to stdout instead of running zabbix_sender.
    pub dry_run: bool,
}

impl ZabbixConfig {
    pub fn sender_options(&self) -> ZabbixSenderOptions {
        ZabbixSenderOptions {
            agent_config: self.agent_config.as_ref().map(PathBuf::from),
            zabbix_server: self.server.clone(),
            host: self.host.clone(),
            port: self.port,
            real_time: self.real_time,
            verbose: self.verbose,
        }
    }
}

impl AppConfig {
    /// Loads `path`, else `CONFIG_FILE`, else built-in defaults. Not validated: callers apply
    /// overrides first, then call [`AppConfig::validate`].
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var("CONFIG_FILE").ok());
        match path {
            Some(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
                Ok(toml::from_str(&s)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Fills the Zabbix server and host from `lookup` (normally the process environment,
    /// `ZABBIX_SERVER` / `ZABBIX_HOST`) when not already set.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.zabbix.server.is_none() {
            self.zabbix.server = lookup("ZABBIX_SERVER");
        }
        if self.zabbix.host.is_none() {
            self.zabbix.host = lookup("ZABBIX_HOST");
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.emitter.interval_secs > 0,
            "emitter.interval_secs must be > 0, got {}",
            self.emitter.interval_secs
        );
        if let Some(port) = self.zabbix.port {
            anyhow::ensure!(
                port > 0,
                "zabbix.port must be between 1 and 65535, got {}",
                port
            );
        }
        if let Some(endpoint) = &self.docker.endpoint {
            anyhow::ensure!(
                !endpoint.is_empty(),
                "docker.endpoint must be non-empty when set"
            );
        }
        anyhow::ensure!(
            self.zabbix.dry_run || self.zabbix.host.is_some() || self.zabbix.agent_config.is_some(),
            "zabbix.host or zabbix.agent_config is required"
        );
        Ok(())
    }
}
