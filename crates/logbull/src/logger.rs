// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing logger.
//!
//! A [`Logger`] filters by level, validates input, merges its persistent
//! context into each call's fields, stamps the entry, echoes it to the
//! console and hands it to the [`Sender`]. Without full credentials it runs
//! in local echo mode and never ships anything.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::entry::{LogEntry, LogLevel};
use crate::errors::ConfigError;
use crate::fields::{merge, sanitize, Fields};
use crate::formatting::{console_line, format_message};
use crate::sender::Sender;
use crate::timestamp::TimestampGenerator;
use crate::transport::{Deliver, HttpTransport};
use crate::validation::{validate_log_fields, validate_log_message};

#[derive(Debug, Clone)]
pub struct Logger {
    config: Arc<Config>,
    sender: Option<Sender>,
    timestamps: Arc<TimestampGenerator>,
    context: Arc<Fields>,
}

impl Logger {
    /// Builds a logger shipping over HTTP, or a local echo logger when the
    /// project ID or host is missing.
    ///
    /// Shipping requires a running tokio runtime.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::build(config, None, Arc::new(TimestampGenerator::new()))
    }

    /// Like [`Logger::new`] but delivering through `transport`.
    pub fn with_transport(config: Config, transport: Arc<dyn Deliver>) -> Result<Self, ConfigError> {
        Self::build(config, Some(transport), Arc::new(TimestampGenerator::new()))
    }

    /// Like [`Logger::new`] but sharing `timestamps` with other loggers so
    /// their entries are ordered against each other.
    pub fn with_timestamps(
        config: Config,
        timestamps: Arc<TimestampGenerator>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, None, timestamps)
    }

    fn build(
        config: Config,
        transport: Option<Arc<dyn Deliver>>,
        timestamps: Arc<TimestampGenerator>,
    ) -> Result<Self, ConfigError> {
        let config = config.normalized();
        config.validate()?;

        let sender = if config.is_console_only() {
            debug!("LOGBULL | No project ID or host configured, logging to console only");
            None
        } else {
            let transport: Arc<dyn Deliver> = match transport {
                Some(transport) => transport,
                None => Arc::new(HttpTransport::new(&config)?),
            };
            Some(Sender::new(config.sender.clone(), transport)?)
        };

        Ok(Self {
            config: Arc::new(config),
            sender,
            timestamps,
            context: Arc::new(Fields::new()),
        })
    }

    pub fn debug(&self, message: &str, fields: Option<Fields>) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Option<Fields>) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warning(&self, message: &str, fields: Option<Fields>) {
        self.log(LogLevel::Warning, message, fields);
    }

    pub fn error(&self, message: &str, fields: Option<Fields>) {
        self.log(LogLevel::Error, message, fields);
    }

    pub fn critical(&self, message: &str, fields: Option<Fields>) {
        self.log(LogLevel::Critical, message, fields);
    }

    /// Emits one entry. Never blocks on the network and never fails: invalid
    /// input is reported as a diagnostic and dropped.
    pub fn log(&self, level: LogLevel, message: &str, fields: Option<Fields>) {
        let Some(entry) = self.build_entry(level, message, fields.as_ref()) else {
            return;
        };

        let line = console_line(&entry);
        if entry.level.is_severe() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }

        if let Some(sender) = &self.sender {
            sender.submit(entry);
        }
    }

    fn build_entry(&self, level: LogLevel, message: &str, fields: Option<&Fields>) -> Option<LogEntry> {
        if level < self.config.log_level {
            return None;
        }
        if let Err(e) = validate_log_message(message) {
            warn!("LOGBULL | Invalid log message: {e}");
            return None;
        }
        if let Err(e) = validate_log_fields(fields) {
            warn!("LOGBULL | Invalid log fields: {e}");
            return None;
        }

        let fields = match fields {
            Some(fields) => merge(&self.context, fields),
            None => sanitize(Some(&self.context)),
        };

        Some(LogEntry {
            level,
            message: format_message(message),
            timestamp: self.timestamps.next(),
            fields,
        })
    }

    /// Returns a logger sharing this one's sender whose entries also carry
    /// `context` (overriding keys already present).
    #[must_use]
    pub fn with_context(&self, context: Fields) -> Self {
        Self {
            config: Arc::clone(&self.config),
            sender: self.sender.clone(),
            timestamps: Arc::clone(&self.timestamps),
            context: Arc::new(merge(&self.context, &context)),
        }
    }

    /// Delivers everything queued so far. No-op in local echo mode.
    pub async fn flush(&self) {
        if let Some(sender) = &self.sender {
            sender.flush().await;
        }
    }

    /// Drains the queue and stops shipping. Shared by every logger derived
    /// through [`Logger::with_context`]. No-op in local echo mode.
    pub async fn shutdown(&self) {
        if let Some(sender) = &self.sender {
            sender.shutdown().await;
        }
    }

    #[must_use]
    pub fn is_console_only(&self) -> bool {
        self.sender.is_none()
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.config.log_level
    }

    #[must_use]
    pub fn context(&self) -> &Fields {
        &self.context
    }

    #[must_use]
    pub fn sender(&self) -> Option<&Sender> {
        self.sender.as_ref()
    }
}
