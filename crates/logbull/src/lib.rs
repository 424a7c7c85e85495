// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # LogBull client
//!
//! Structured logging that ships entries to a LogBull server.
//!
//! Producers call a [`Logger`], which filters by level, validates, stamps and
//! echoes each entry before handing it to a [`Sender`]. The sender buffers
//! entries in a bounded queue, cuts them into batches and delivers them over
//! HTTP on a background schedule. Delivery never blocks or fails the caller:
//! a full queue drops new entries and a failed request drops its batch.
//!
//! - [`Logger`]: level methods, persistent context, flush and shutdown
//! - [`Sender`]: queue, periodic flush and the bounded worker gate
//! - [`HttpTransport`]: the POST to `/api/v1/logs/receiving/{project_id}`
//! - [`LogBullLayer`]: forwards `tracing` events through a logger

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod entry;
pub mod errors;
pub mod fields;
pub mod formatting;
pub mod layer;
pub mod logger;
pub mod sender;
pub mod timestamp;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::{Config, SenderConfig};
pub use entry::{DeliveryResponse, LogBatch, LogEntry, LogLevel, RejectedEntry};
pub use errors::{ConfigError, DeliveryError, ValidationError};
pub use fields::{FieldValue, Fields};
pub use layer::LogBullLayer;
pub use logger::Logger;
pub use sender::{Sender, SenderState, SenderStats};
pub use timestamp::TimestampGenerator;
pub use transport::{Deliver, DeliveryOutcome, HttpTransport};
