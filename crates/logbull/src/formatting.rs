// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::entry::LogEntry;
use crate::validation::MAX_MESSAGE_LENGTH;

const TRUNCATION_SUFFIX: &str = "...";

/// Trims the message and caps it at [`MAX_MESSAGE_LENGTH`] characters,
/// marking truncation with a trailing `...`.
#[must_use]
pub fn format_message(message: &str) -> String {
    let message = message.trim();
    if message.chars().count() <= MAX_MESSAGE_LENGTH {
        return message.to_string();
    }

    let keep = MAX_MESSAGE_LENGTH - TRUNCATION_SUFFIX.len();
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Renders the local echo line: `[timestamp] [LEVEL] message (k=v, ...)`.
#[must_use]
pub fn console_line(entry: &LogEntry) -> String {
    let mut line = format!("[{}] [{}] {}", entry.timestamp, entry.level, entry.message);
    if !entry.fields.is_empty() {
        let fields = entry
            .fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" ({fields})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogLevel;

    #[test]
    fn test_format_message_trims() {
        assert_eq!(format_message("  hello world \n"), "hello world");
    }

    #[test]
    fn test_format_message_truncates_long_input() {
        let formatted = format_message(&"x".repeat(MAX_MESSAGE_LENGTH + 500));
        assert_eq!(formatted.chars().count(), MAX_MESSAGE_LENGTH);
        assert!(formatted.ends_with("..."));

        let exact = "y".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(format_message(&exact), exact);
    }

    #[test]
    fn test_format_message_truncates_on_char_boundary() {
        let formatted = format_message(&"é".repeat(MAX_MESSAGE_LENGTH + 1));
        assert_eq!(formatted.chars().count(), MAX_MESSAGE_LENGTH);
        assert!(formatted.starts_with("éé"));
    }

    #[test]
    fn test_console_line() {
        let entry = LogEntry {
            level: LogLevel::Error,
            message: "payment failed".to_string(),
            timestamp: "2025-01-01T00:00:00.000000000Z".to_string(),
            fields: crate::fields! { "amount" => 42, "currency" => "EUR" },
        };
        assert_eq!(
            console_line(&entry),
            "[2025-01-01T00:00:00.000000000Z] [ERROR] payment failed (amount=42, currency=EUR)"
        );

        let bare = LogEntry {
            fields: crate::Fields::new(),
            ..entry
        };
        assert_eq!(
            console_line(&bare),
            "[2025-01-01T00:00:00.000000000Z] [ERROR] payment failed"
        );
    }
}
