// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pre-check gate for credentials and log input.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

use crate::errors::{ConfigError, ValidationError};
use crate::fields::Fields;

pub const MAX_MESSAGE_LENGTH: usize = 10_000;
pub const MAX_FIELDS_COUNT: usize = 100;
pub const MAX_FIELD_KEY_LENGTH: usize = 100;
const MIN_API_KEY_LENGTH: usize = 10;

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("UUID pattern is valid")
    })
}

fn api_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-.]+$").expect("API key pattern is valid"))
}

pub fn validate_project_id(project_id: &str) -> Result<(), ConfigError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(ConfigError::EmptyProjectId);
    }
    if !uuid_pattern().is_match(project_id) {
        return Err(ConfigError::InvalidProjectId(project_id.to_string()));
    }
    Ok(())
}

pub fn validate_host_url(host: &str) -> Result<(), ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::EmptyHost);
    }

    let url = Url::parse(host).map_err(|e| ConfigError::InvalidHost(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingHostComponent);
    }
    Ok(())
}

pub fn validate_api_key(api_key: &str) -> Result<(), ConfigError> {
    let api_key = api_key.trim();
    if api_key.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::ApiKeyTooShort);
    }
    if !api_key_pattern().is_match(api_key) {
        return Err(ConfigError::InvalidApiKey);
    }
    Ok(())
}

pub fn validate_log_message(message: &str) -> Result<(), ValidationError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = message.chars().count();
    if len > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LENGTH,
        });
    }
    Ok(())
}

pub fn validate_log_fields(fields: Option<&Fields>) -> Result<(), ValidationError> {
    let Some(fields) = fields else {
        return Ok(());
    };

    if fields.len() > MAX_FIELDS_COUNT {
        return Err(ValidationError::TooManyFields {
            count: fields.len(),
            max: MAX_FIELDS_COUNT,
        });
    }

    for key in fields.keys() {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptyFieldKey);
        }
        let len = key.chars().count();
        if len > MAX_FIELD_KEY_LENGTH {
            return Err(ValidationError::FieldKeyTooLong {
                len,
                max: MAX_FIELD_KEY_LENGTH,
            });
        }
    }
    Ok(())
}
