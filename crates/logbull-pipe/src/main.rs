// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logbull::{fields, Config, LogLevel, Logger};

const SOURCE: &str = "stdin";

#[tokio::main]
pub async fn main() {
    let log_level = env::var("RUST_LOG")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid LogBull configuration: {e}");
            return;
        }
    };

    let level = match env::var("LOGBULL_PIPE_LEVEL") {
        Ok(level) if !level.trim().is_empty() => match level.parse::<LogLevel>() {
            Ok(level) => level,
            Err(e) => {
                error!("Invalid LOGBULL_PIPE_LEVEL: {e}");
                return;
            }
        },
        _ => LogLevel::Info,
    };

    let logger = match Logger::new(config) {
        Ok(logger) => logger,
        Err(e) => {
            error!("Unable to start LogBull logger: {e}");
            return;
        }
    };

    if logger.is_console_only() {
        info!("LOGBULL_PROJECT_ID or LOGBULL_HOST not set, echoing lines without shipping them");
    }

    let mut lines = BufReader::new(stdin()).lines();
    let mut shipped: u64 = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                logger.log(level, &line, Some(fields! { "source" => SOURCE }));
                shipped += 1;
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }

    debug!("Reached end of input after {shipped} lines, shutting down");
    logger.shutdown().await;
}
