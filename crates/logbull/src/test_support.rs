// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for logger and layer tests.

#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::Config;
use crate::entry::{LogBatch, LogEntry, LogLevel};
use crate::logger::Logger;
use crate::transport::{Deliver, DeliveryOutcome};

pub(crate) const PROJECT_ID: &str = "12345678-1234-1234-1234-123456789012";

/// Transport keeping every delivered entry in delivery order.
#[derive(Default)]
pub(crate) struct CollectingTransport {
    pub(crate) entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl Deliver for CollectingTransport {
    async fn deliver(&self, batch: LogBatch) -> DeliveryOutcome {
        #[allow(clippy::unwrap_used)]
        self.entries.lock().unwrap().extend(batch.logs);
        DeliveryOutcome::DeliveredUnparsed
    }
}

/// Logger shipping to a [`CollectingTransport`]. Needs a tokio runtime.
pub(crate) fn shipping_logger(level: LogLevel) -> (Logger, Arc<CollectingTransport>) {
    let transport = Arc::new(CollectingTransport::default());
    let config = Config::new(PROJECT_ID, "http://localhost:4005").with_log_level(level);
    #[allow(clippy::expect_used)]
    let logger = Logger::with_transport(config, transport.clone()).expect("valid test config");
    (logger, transport)
}
