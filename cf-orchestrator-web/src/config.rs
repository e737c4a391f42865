//! Server configuration loaded from `config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use cf_orchestrator_core::config::BulkConfig;
use cf_orchestrator_core::types::SecurityLevel;

/// Environment variable pointing at the config file
pub const CONFIG_PATH_ENV: &str = "CF_ORCHESTRATOR_CONFIG";
pub const HOST_ENV: &str = "CF_ORCHESTRATOR_HOST";
pub const PORT_ENV: &str = "CF_ORCHESTRATOR_PORT";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub bulk: BulkSection,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker threads; 0 means one per CPU
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 0,
        }
    }
}

impl ServerConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
        }
    }
}

/// `[bulk]` section, mapped onto [`BulkConfig`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BulkSection {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub verify_attempts: u32,
    pub verify_delay_ms: u64,
    pub under_attack_fallback_level: SecurityLevel,
    pub rule_status_ttl_minutes: u64,
}

impl Default for BulkSection {
    fn default() -> Self {
        Self::from(&BulkConfig::default())
    }
}

impl From<&BulkConfig> for BulkSection {
    fn from(config: &BulkConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay_ms: duration_ms(config.batch_delay),
            verify_attempts: config.verify_attempts,
            verify_delay_ms: duration_ms(config.verify_delay),
            under_attack_fallback_level: config.under_attack_fallback,
            rule_status_ttl_minutes: config.rule_status_ttl.as_secs() / 60,
        }
    }
}

impl BulkSection {
    pub fn to_bulk_config(&self) -> BulkConfig {
        BulkConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            verify_attempts: self.verify_attempts,
            verify_delay: Duration::from_millis(self.verify_delay_ms),
            under_attack_fallback: self.under_attack_fallback_level,
            rule_status_ttl: Duration::from_secs(self.rule_status_ttl_minutes * 60),
        }
        .validated()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
    /// Also write daily-rotated files here
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            dir: None,
        }
    }
}

impl Config {
    /// Load from `CF_ORCHESTRATOR_CONFIG` or `./config.toml`, then apply env overrides.
    ///
    /// A missing default file is not an error; an explicitly named one is.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(host) = var(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = var(PORT_ENV) {
            self.server.port = port
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port}"))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
