// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while building a logger or sender. Fatal to construction only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("project ID cannot be empty")]
    EmptyProjectId,

    #[error("invalid project ID format '{0}'. Must be a valid UUID format: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx")]
    InvalidProjectId(String),

    #[error("host URL cannot be empty")]
    EmptyHost,

    #[error("invalid host URL format: {0}")]
    InvalidHost(String),

    #[error("host URL must use http or https scheme, got: {0}")]
    UnsupportedScheme(String),

    #[error("host URL must have a host component")]
    MissingHostComponent,

    #[error("API key must be at least 10 characters long")]
    ApiKeyTooShort,

    #[error("invalid API key format. API key must contain only alphanumeric characters, underscores, hyphens, and dots")]
    InvalidApiKey,

    #[error("invalid log level '{0}'. Must be one of: DEBUG, INFO, WARNING, ERROR, CRITICAL")]
    InvalidLogLevel(String),

    #[error("invalid sender configuration: {0}")]
    InvalidSender(String),

    #[error("no tokio runtime available to run the sender")]
    NoRuntime,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Reasons an entry is refused by the pre-check gate. Logged, never returned to producers.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("log message cannot be empty")]
    EmptyMessage,

    #[error("log message too long ({len} chars). Maximum allowed: {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("too many fields ({count}). Maximum allowed: {max}")]
    TooManyFields { count: usize, max: usize },

    #[error("field key cannot be empty")]
    EmptyFieldKey,

    #[error("field key too long ({len} chars). Maximum: {max}")]
    FieldKeyTooLong { len: usize, max: usize },
}

/// Terminal failure of a single batch delivery. The batch is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to marshal batch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}
