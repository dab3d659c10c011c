//! TOML configuration.
//!
//! Every field is optional in the file. Zero or blank values fall back to
//! the defaults; only settings that cannot be defaulted are validated.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::Path};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

use crate::core::converter::{FieldConverter, DEFAULT_LEVEL_KEY, DEFAULT_MESSAGE_KEY};
use crate::core::service::{
    ServiceConfig, DEFAULT_ADMISSION_TIMEOUT, DEFAULT_FLUSH_INTERVAL, DEFAULT_QUEUE_CAPACITY,
};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config {field:?} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileConfig {
    #[serde(default)]
    service: ServiceSection,
    #[serde(default)]
    record: RecordSection,
    #[serde(default)]
    sink: SinkSection,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct ServiceSection {
    queue_capacity: Option<usize>,
    admission_timeout_ms: Option<u64>,
    flush_interval_ms: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct RecordSection {
    message_key: Option<String>,
    level_key: Option<String>,
    max_level: Option<String>,
    #[serde(default)]
    extra: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct SinkSection {
    #[serde(default)]
    kind: SinkKind,
    path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    Stdout,
    File { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfig {
    pub message_key: String,
    pub level_key: String,
    pub max_level: LevelFilter,
    pub extra: HashMap<String, String>,
}

impl RecordConfig {
    pub fn converter(&self) -> FieldConverter {
        FieldConverter::new(self.message_key.clone(), self.level_key.clone())
            .with_extra(self.extra.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    pub shutdown_timeout: Duration,
    pub record: RecordConfig,
    pub sink: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            record: RecordConfig {
                message_key: DEFAULT_MESSAGE_KEY.to_string(),
                level_key: DEFAULT_LEVEL_KEY.to_string(),
                max_level: DEFAULT_MAX_LEVEL,
                extra: HashMap::new(),
            },
            sink: SinkConfig::Stdout,
        }
    }
}

fn coalesce_str(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn coalesce_ms(value: Option<u64>, default: Duration) -> Duration {
    value
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl FileConfig {
    fn resolve(self) -> Result<Config, ConfigError> {
        let service = ServiceConfig {
            queue_capacity: self
                .service
                .queue_capacity
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            admission_timeout: coalesce_ms(
                self.service.admission_timeout_ms,
                DEFAULT_ADMISSION_TIMEOUT,
            ),
            flush_interval: coalesce_ms(self.service.flush_interval_ms, DEFAULT_FLUSH_INTERVAL),
        };

        let max_level = match self.record.max_level.filter(|s| !s.trim().is_empty()) {
            None => DEFAULT_MAX_LEVEL,
            Some(raw) => LevelFilter::from_str(raw.trim()).map_err(|_| {
                ConfigError::invalid("record.max_level", format!("unknown level {raw:?}"))
            })?,
        };

        let sink = match self.sink.kind {
            SinkKind::Stdout => SinkConfig::Stdout,
            SinkKind::File => match self.sink.path.filter(|p| !p.trim().is_empty()) {
                Some(path) => SinkConfig::File { path },
                None => return Err(ConfigError::invalid("sink.path", "is required")),
            },
        };

        Ok(Config {
            service,
            shutdown_timeout: coalesce_ms(
                self.service.shutdown_timeout_ms,
                DEFAULT_SHUTDOWN_TIMEOUT,
            ),
            record: RecordConfig {
                message_key: coalesce_str(self.record.message_key, DEFAULT_MESSAGE_KEY),
                level_key: coalesce_str(self.record.level_key, DEFAULT_LEVEL_KEY),
                max_level,
                extra: self.record.extra,
            },
            sink,
        })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let file: FileConfig = toml::from_str(raw)?;
        file.resolve()
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw: String = fs::read_to_string(path)?;
    raw.parse()
}
