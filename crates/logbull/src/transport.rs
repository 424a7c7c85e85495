// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of batches to the LogBull receiving endpoint.
//!
//! Every failure is handled here: the batch is logged and dropped, nothing is
//! retried or requeued, and producers never see the outcome. A 2xx response
//! reporting rejected entries is resolved back against the sent batch so the
//! offending entries can be diagnosed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::entry::{DeliveryResponse, LogBatch, LogEntry};
use crate::errors::{ConfigError, DeliveryError};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const CLIENT_USER_AGENT: &str = concat!("LogBull-Rust-Client/", env!("CARGO_PKG_VERSION"));

/// Terminal result of one delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// 200/202 with a parsed body, possibly reporting rejected entries.
    Delivered(DeliveryResponse),
    /// 200/202 whose body could not be parsed. Counted as success.
    DeliveredUnparsed,
    /// The batch was dropped.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Sends one batch. Implementations must not panic and must not retry.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, batch: LogBatch) -> DeliveryOutcome;
}

/// [`Deliver`] over HTTP POST with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let url = config.receiving_url().ok_or(if config.host.is_none() {
            ConfigError::EmptyHost
        } else {
            ConfigError::EmptyProjectId
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        if let Some(api_key) = config.api_key.as_deref() {
            let mut value =
                HeaderValue::from_str(api_key.trim()).map_err(|_| ConfigError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let timeout = config.sender.http_timeout;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            headers,
            timeout,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, batch: &LogBatch) -> Result<DeliveryOutcome, DeliveryError> {
        let body = serde_json::to_vec(batch)?;

        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(DeliveryError::Status { status, body });
        }

        match serde_json::from_str::<DeliveryResponse>(&body) {
            Ok(response) => Ok(DeliveryOutcome::Delivered(response)),
            Err(e) => {
                debug!("LOGBULL | Ignoring unparsable intake response: {e}");
                Ok(DeliveryOutcome::DeliveredUnparsed)
            }
        }
    }
}

#[async_trait]
impl Deliver for HttpTransport {
    async fn deliver(&self, batch: LogBatch) -> DeliveryOutcome {
        let n_entries = batch.len();
        match self.send(&batch).await {
            Ok(DeliveryOutcome::Delivered(response)) => {
                if response.rejected > 0 {
                    report_rejections(&response, &batch.logs);
                } else {
                    debug!("LOGBULL | Delivered {n_entries} log entries");
                }
                DeliveryOutcome::Delivered(response)
            }
            Ok(outcome) => outcome,
            Err(e) => {
                error!("LOGBULL | Dropping batch of {n_entries} log entries: {e}");
                DeliveryOutcome::Failed(e)
            }
        }
    }
}

/// Logs every entry the intake rejected. Indices outside `sent` are ignored.
///
/// Returns the number of rejections that could be resolved to an entry.
pub fn report_rejections(response: &DeliveryResponse, sent: &[LogEntry]) -> usize {
    warn!("LOGBULL | Rejected {} log entries", response.rejected);

    let mut resolved = 0;
    for rejection in &response.errors {
        let Some(entry) = usize::try_from(rejection.index)
            .ok()
            .and_then(|index| sent.get(index))
        else {
            debug!(
                "LOGBULL | Rejection index {} is out of range for a batch of {}",
                rejection.index,
                sent.len()
            );
            continue;
        };

        resolved += 1;
        let fields = serde_json::to_string(&entry.fields).unwrap_or_else(|_| format!("{:?}", entry.fields));
        error!(
            "LOGBULL | Log #{} rejected ({}): level={} message={:?} timestamp={} fields={}",
            rejection.index, rejection.message, entry.level, entry.message, entry.timestamp, fields
        );
    }
    resolved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entry::{LogLevel, RejectedEntry};
    use mockito::{Matcher, Server};
    use tracing_test::traced_test;

    const PROJECT_ID: &str = "12345678-1234-1234-1234-123456789012";

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            level: LogLevel::Info,
            message: message.to_string(),
            timestamp: "2025-01-01T00:00:00.000000000Z".to_string(),
            fields: crate::fields! { "user_id" => "u-1" },
        }
    }

    fn transport(host: &str, api_key: Option<&str>) -> HttpTransport {
        let mut config = Config::new(PROJECT_ID, host);
        config.api_key = api_key.map(str::to_string);
        config.sender.http_timeout = Duration::from_secs(5);
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(matches!(
            HttpTransport::new(&Config::default()),
            Err(ConfigError::EmptyHost)
        ));
        let only_host = Config {
            host: Some("http://localhost:4005".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            HttpTransport::new(&only_host),
            Err(ConfigError::EmptyProjectId)
        ));
    }

    #[test]
    fn test_url_and_headers() {
        let transport = transport("http://localhost:4005", Some("abc_DEF-123.xyz"));
        assert_eq!(
            transport.url(),
            "http://localhost:4005/api/v1/logs/receiving/12345678-1234-1234-1234-123456789012"
        );
        assert_eq!(transport.headers[CONTENT_TYPE], "application/json");
        assert_eq!(transport.headers[API_KEY_HEADER], "abc_DEF-123.xyz");
        assert!(transport.headers[USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("LogBull-Rust-Client/"));

        assert!(!format!("{transport:?}").contains("abc_DEF-123.xyz"));

        let anonymous = self::transport("http://localhost:4005", None);
        assert!(!anonymous.headers.contains_key(API_KEY_HEADER));
    }

    #[tokio::test]
    async fn test_deliver_posts_batch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", format!("/api/v1/logs/receiving/{PROJECT_ID}").as_str())
            .match_header("content-type", "application/json")
            .match_header("x-api-key", "abc_DEF-123.xyz")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "logs": [{"level": "INFO", "message": "first"}, {"message": "second"}]
            })))
            .with_status(202)
            .with_body(r#"{"accepted": 2, "rejected": 0}"#)
            .create_async()
            .await;

        let transport = transport(&server.url(), Some("abc_DEF-123.xyz"));
        let outcome = transport
            .deliver(LogBatch::new(vec![entry("first"), entry("second")]))
            .await;

        mock.assert_async().await;
        match outcome {
            DeliveryOutcome::Delivered(response) => assert_eq!(response.accepted, 2),
            other => panic!("expected a parsed response, got {other:?}"),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_server_error_drops_batch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .with_body("Internal Server Error")
            .expect(1)
            .create_async()
            .await;

        let outcome = transport(&server.url(), None)
            .deliver(LogBatch::new(vec![entry("lost")]))
            .await;

        mock.assert_async().await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed(DeliveryError::Status { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(logs_contain("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_deliver_unparsable_body_is_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;

        let outcome = transport(&server.url(), None)
            .deliver(LogBatch::new(vec![entry("fine")]))
            .await;
        assert!(matches!(outcome, DeliveryOutcome::DeliveredUnparsed));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_connection_failure_drops_batch() {
        // Nothing listens on the discard port.
        let outcome = transport("http://127.0.0.1:9", None)
            .deliver(LogBatch::new(vec![entry("unreachable")]))
            .await;
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed(DeliveryError::Request(_))
        ));
        assert!(logs_contain("Dropping batch of 1 log entries"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_reports_rejected_entry_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"accepted": 0, "rejected": 1, "errors": [{"index": 0, "message": "timestamp too old"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let outcome = transport(&server.url(), None)
            .deliver(LogBatch::new(vec![entry("rejected payload")]))
            .await;

        mock.assert_async().await;
        assert!(outcome.is_success());
        assert!(logs_contain("Rejected 1 log entries"));
        assert!(logs_contain("Log #0 rejected (timestamp too old)"));
        assert!(logs_contain("rejected payload"));
        assert!(logs_contain("2025-01-01T00:00:00.000000000Z"));
        assert!(logs_contain("user_id"));
    }

    #[test]
    #[traced_test]
    fn test_report_rejections_ignores_out_of_range_indices() {
        let response = DeliveryResponse {
            accepted: 1,
            rejected: 3,
            message: None,
            errors: vec![
                RejectedEntry {
                    index: 1,
                    message: "bad field".to_string(),
                },
                RejectedEntry {
                    index: 7,
                    message: "out of range".to_string(),
                },
                RejectedEntry {
                    index: -1,
                    message: "negative".to_string(),
                },
            ],
        };
        let sent = vec![entry("kept"), entry("second entry")];

        assert_eq!(report_rejections(&response, &sent), 1);
        assert!(logs_contain("Log #1 rejected (bad field)"));
        assert!(!logs_contain("Log #7 rejected"));
        assert!(!logs_contain("Log #-1 rejected"));
    }
}
