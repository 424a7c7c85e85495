// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Strictly increasing entry timestamps.
//!
//! The intake orders entries by timestamp, so two entries must never share
//! one. When the wall clock has not moved past the last issued value (coarse
//! clocks, bursts, clock steps backwards) the generator issues the last value
//! plus one nanosecond instead.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Issues unique, monotonic RFC 3339 timestamps with nanosecond precision.
///
/// One generator is shared (behind an `Arc`) by every logger that must agree
/// on ordering.
#[derive(Debug, Default)]
pub struct TimestampGenerator {
    last_ns: Mutex<i64>,
}

impl TimestampGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next timestamp, strictly greater than every previous one.
    pub fn next(&self) -> String {
        let now_ns = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        format_timestamp(self.next_ns(now_ns))
    }

    fn next_ns(&self, now_ns: i64) -> i64 {
        // A poisoned lock still holds a valid last value.
        let mut last = self
            .last_ns
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let issued = if now_ns <= *last {
            last.saturating_add(1)
        } else {
            now_ns
        };
        *last = issued;
        issued
    }
}

/// Formats nanoseconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`.
#[must_use]
pub fn format_timestamp(timestamp_ns: i64) -> String {
    let secs = timestamp_ns.div_euclid(NANOS_PER_SEC);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let nanos = timestamp_ns.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
