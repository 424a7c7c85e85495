// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::time::Duration;

use crate::entry::LogLevel;
use crate::errors::ConfigError;
use crate::validation::{validate_api_key, validate_host_url, validate_project_id};

pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration.
///
/// Leaving either `project_id` or `host` unset puts the logger in local echo
/// mode: entries are printed but never shipped.
#[derive(Clone, Default)]
pub struct Config {
    /// LogBull project UUID
    pub project_id: Option<String>,
    /// Base URL of the LogBull server (e.g. "https://logbull.example.com")
    pub host: Option<String>,
    /// Optional API key sent as `X-API-Key`
    pub api_key: Option<String>,
    /// Entries below this level are discarded by the logger
    pub log_level: LogLevel,
    pub sender: SenderConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("project_id", &self.project_id)
            .field("host", &self.host)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("log_level", &self.log_level)
            .field("sender", &self.sender)
            .finish()
    }
}

/// Queueing, batching and delivery tuning for a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Maximum entries per request
    pub batch_size: usize,
    /// Entries buffered before new ones are dropped
    pub queue_capacity: usize,
    /// Period of the background flush
    pub flush_interval: Duration,
    /// Deliveries admitted through the worker gate at once
    pub max_workers: usize,
    /// Upper bound on one HTTP exchange
    pub http_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_workers: DEFAULT_MAX_WORKERS,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidSender(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidSender(
                "queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidSender(
                "max workers must be greater than 0".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::InvalidSender(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn new(project_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            host: Some(host.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: SenderConfig) -> Self {
        self.sender = sender;
        self
    }

    /// Reads `LOGBULL_PROJECT_ID`, `LOGBULL_HOST`, `LOGBULL_API_KEY` and
    /// `LOGBULL_LOG_LEVEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level = match env::var("LOGBULL_LOG_LEVEL") {
            Ok(level) if !level.trim().is_empty() => level.parse()?,
            _ => LogLevel::default(),
        };

        let config = Self {
            project_id: env::var("LOGBULL_PROJECT_ID").ok(),
            host: env::var("LOGBULL_HOST").ok(),
            api_key: env::var("LOGBULL_API_KEY").ok(),
            log_level,
            sender: SenderConfig::default(),
        }
        .normalized();

        config.validate()?;
        Ok(config)
    }

    /// Trims every credential and turns blank ones into `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            project_id: non_empty(self.project_id),
            host: non_empty(self.host).map(|h| h.trim_end_matches('/').to_string()),
            api_key: non_empty(self.api_key),
            ..self
        }
    }

    #[must_use]
    pub fn is_console_only(&self) -> bool {
        self.project_id.as_deref().map_or(true, |p| p.trim().is_empty())
            || self.host.as_deref().map_or(true, |h| h.trim().is_empty())
    }

    /// Validates credentials. Partial credentials are not checked since they
    /// only select local echo mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_console_only() {
            return Ok(());
        }
        validate_project_id(self.project_id.as_deref().unwrap_or_default())?;
        validate_host_url(self.host.as_deref().unwrap_or_default())?;
        if let Some(api_key) = self.api_key.as_deref() {
            validate_api_key(api_key)?;
        }
        self.sender.validate()
    }

    /// `{host}/api/v1/logs/receiving/{project_id}`, or `None` in local echo mode.
    #[must_use]
    pub fn receiving_url(&self) -> Option<String> {
        match (self.host.as_deref(), self.project_id.as_deref()) {
            (Some(host), Some(project_id)) if !self.is_console_only() => Some(format!(
                "{}/api/v1/logs/receiving/{}",
                host.trim().trim_end_matches('/'),
                project_id.trim()
            )),
            _ => None,
        }
    }
}
