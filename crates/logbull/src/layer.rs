// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`LogBullLayer`] turns `tracing` events into LogBull entries so an
//! application instrumented with `tracing` ships its logs without calling the
//! [`Logger`] directly.
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let logger = logbull::Logger::new(logbull::Config::from_env()?)?;
//! tracing_subscriber::registry()
//!     .with(logbull::LogBullLayer::new(logger.clone()))
//!     .init();
//!
//! tracing::info!(user_id = "u-1", "user signed in");
//! logger.shutdown().await;
//! ```

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::entry::LogLevel;
use crate::fields::{FieldValue, Fields};
use crate::logger::Logger;

const MESSAGE_FIELD: &str = "message";
const TARGET_FIELD: &str = "target";

// Events from these targets are emitted while delivering logs. Shipping them
// would feed the pipeline with its own diagnostics.
const DEFAULT_IGNORED_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

pub struct LogBullLayer {
    logger: Logger,
    ignored_targets: Vec<String>,
}

impl LogBullLayer {
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            ignored_targets: DEFAULT_IGNORED_TARGETS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Skips events whose target is `target` or one of its submodules.
    #[must_use]
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target
                .strip_prefix(ignored.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

#[must_use]
pub fn level_from_tracing(level: Level) -> LogLevel {
    match level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

impl<S: Subscriber> Layer<S> for LogBullLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_ignored(metadata.target()) {
            return;
        }

        let level = level_from_tracing(*metadata.level());
        if level < self.logger.level() {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        fields
            .entry(TARGET_FIELD.to_string())
            .or_insert_with(|| FieldValue::from(metadata.target()));

        self.logger
            .log(level, &visitor.message.unwrap_or_default(), Some(fields));
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Fields,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: FieldValue) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, FieldValue::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, FieldValue::from(format!("{value:?}")));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::shipping_logger;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_from_tracing(Level::TRACE), LogLevel::Debug);
        assert_eq!(level_from_tracing(Level::DEBUG), LogLevel::Debug);
        assert_eq!(level_from_tracing(Level::INFO), LogLevel::Info);
        assert_eq!(level_from_tracing(Level::WARN), LogLevel::Warning);
        assert_eq!(level_from_tracing(Level::ERROR), LogLevel::Error);
    }

    #[tokio::test]
    async fn test_events_become_entries() {
        let (logger, transport) = shipping_logger(LogLevel::Info);
        let subscriber = Registry::default().with(LogBullLayer::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "checkout", user_id = "u-1", items = 3_u64, paid = true, "order placed");
            tracing::warn!(target: "checkout", latency_ms = 12.5, "slow payment provider");
            tracing::debug!(target: "checkout", "below the configured level");
        });
        logger.shutdown().await;

        let entries = transport.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "order placed");
        assert_eq!(
            entries[0].fields,
            crate::fields! {
                "items" => 3_u64,
                "paid" => true,
                "target" => "checkout",
                "user_id" => "u-1",
            }
        );

        assert_eq!(entries[1].level, LogLevel::Warning);
        assert_eq!(entries[1].fields["latency_ms"], FieldValue::Float(12.5));
    }

    #[tokio::test]
    async fn test_own_and_http_stack_events_are_ignored() {
        let (logger, transport) = shipping_logger(LogLevel::Debug);
        let subscriber = Registry::default()
            .with(LogBullLayer::new(logger.clone()).ignore_target("noisy_dependency"));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "logbull::transport", "delivery diagnostic");
            tracing::debug!(target: "hyper_util::client", "connection pooled");
            tracing::info!(target: "noisy_dependency::inner", "chatter");
            tracing::info!(target: "logbull_app", "shipped");
        });
        logger.shutdown().await;

        let entries = transport.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "shipped");
    }
}
