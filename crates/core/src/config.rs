use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::version::LedgerVersion;

pub const DEFAULT_IMAGE_NAME: &str = "ghcr.io/hyperledger/cactus-fabric-all-in-one";
pub const DEFAULT_IMAGE_VERSION: &str = "2021-04-20-nodejs";

/// Environment variable the image reads to decide which ledger release to
/// boot. Also drives topology template selection.
pub const LEDGER_VERSION_ENV: &str = "FABRIC_VERSION";
pub const DEFAULT_LEDGER_VERSION: &str = "1.4.8";

/// Oldest ledger release the topology templates were written against.
pub const LOWEST_SUPPORTED_LEDGER_VERSION: LedgerVersion = LedgerVersion::new(1, 4, 8);

pub const MIN_IMAGE_VERSION_LEN: usize = 5;

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(180_000);

static IMAGE_PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._-]|__|--)[a-z0-9]+)*$").expect("static regex is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("publish_all_ports is required")]
    MissingPublishAllPorts,

    #[error("image version {0:?} must be at least {MIN_IMAGE_VERSION_LEN} characters long")]
    ImageVersionTooShort(String),

    #[error("image name {0:?} must be lowercase alphanumeric path components separated by '.', '_', '-', '__' or '--'")]
    InvalidImageName(String),

    #[error("environment entry {key:?} must have a non-empty key and value")]
    EmptyEnvEntry { key: String },

    #[error("environment is missing the {LEDGER_VERSION_ENV} entry")]
    MissingLedgerVersion,

    #[error("environment entry {LEDGER_VERSION_ENV}={0:?} is not a comparable version")]
    InvalidLedgerVersion(String),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Raw, caller-supplied instance options. Everything except
/// `publish_all_ports` may be omitted and falls back to a default during
/// [`LedgerInstanceOptions::validate`].
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LedgerInstanceOptions {
    pub publish_all_ports: Option<bool>,
    pub image_name: Option<String>,
    pub image_version: Option<String>,
    pub env_vars: Option<BTreeMap<String, String>>,
    pub log_level: Option<LogLevel>,
    pub emit_container_logs: Option<bool>,

    /// How long `start` waits for the instance to report healthy.
    pub health_timeout_ms: Option<u64>,
}

impl LedgerInstanceOptions {
    pub fn new(publish_all_ports: bool) -> Self {
        Self {
            publish_all_ports: Some(publish_all_ports),
            ..Default::default()
        }
    }

    pub fn validate(self) -> Result<LedgerInstanceConfig, ConfigValidationError> {
        let publish_all_ports = self
            .publish_all_ports
            .ok_or(ConfigValidationError::MissingPublishAllPorts)?;

        let image_version = self
            .image_version
            .unwrap_or_else(|| DEFAULT_IMAGE_VERSION.to_owned());

        if image_version.chars().count() < MIN_IMAGE_VERSION_LEN {
            return Err(ConfigValidationError::ImageVersionTooShort(image_version));
        }

        let image_name = self
            .image_name
            .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_owned());

        if !is_valid_image_name(&image_name) {
            return Err(ConfigValidationError::InvalidImageName(image_name));
        }

        let env_vars = match self.env_vars {
            Some(env_vars) => {
                if let Some((key, _)) = env_vars
                    .iter()
                    .find(|(k, v)| k.trim().is_empty() || v.trim().is_empty())
                {
                    return Err(ConfigValidationError::EmptyEnvEntry { key: key.clone() });
                }

                env_vars
            }
            None => BTreeMap::from([(
                LEDGER_VERSION_ENV.to_owned(),
                DEFAULT_LEDGER_VERSION.to_owned(),
            )]),
        };

        let raw_version = env_vars
            .get(LEDGER_VERSION_ENV)
            .ok_or(ConfigValidationError::MissingLedgerVersion)?;

        let ledger_version: LedgerVersion = raw_version
            .parse()
            .map_err(|_| ConfigValidationError::InvalidLedgerVersion(raw_version.clone()))?;

        if ledger_version < LOWEST_SUPPORTED_LEDGER_VERSION {
            warn!(
                %ledger_version,
                lowest = %LOWEST_SUPPORTED_LEDGER_VERSION,
                "ledger version is older than what the topology templates were written for"
            );
        }

        Ok(LedgerInstanceConfig {
            image_name,
            image_version,
            publish_all_ports,
            env_vars,
            ledger_version,
            log_level: self.log_level.unwrap_or_default(),
            emit_container_logs: self.emit_container_logs.unwrap_or(true),
            health_timeout: self
                .health_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_HEALTH_TIMEOUT),
        })
    }
}

/// Checks each `/`-separated component of an image name against the
/// registry path grammar.
pub fn is_valid_image_name(name: &str) -> bool {
    !name.is_empty() && name.split('/').all(|c| IMAGE_PATH_COMPONENT.is_match(c))
}

/// Validated instance configuration. Only obtainable through
/// [`LedgerInstanceOptions::validate`].
#[derive(Clone, Debug)]
pub struct LedgerInstanceConfig {
    image_name: String,
    image_version: String,
    publish_all_ports: bool,
    env_vars: BTreeMap<String, String>,
    ledger_version: LedgerVersion,
    log_level: LogLevel,
    emit_container_logs: bool,
    health_timeout: Duration,
}

impl LedgerInstanceConfig {
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn image_version(&self) -> &str {
        &self.image_version
    }

    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image_name, self.image_version)
    }

    pub fn publish_all_ports(&self) -> bool {
        self.publish_all_ports
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env_vars
    }

    /// Environment rendered the way container runtimes expect it.
    pub fn env_list(&self) -> Vec<String> {
        self.env_vars
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }

    pub fn ledger_version(&self) -> &LedgerVersion {
        &self.ledger_version
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn emit_container_logs(&self) -> bool {
        self.emit_container_logs
    }

    pub fn health_timeout(&self) -> Duration {
        self.health_timeout
    }
}
