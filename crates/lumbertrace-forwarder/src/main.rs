// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use lumbertrace::{
    config::ENV_LOG_LEVEL, logger::Formatter, ClientMetadata, Config, EventBuffer, LogLevel,
    LogRecord, SessionController, TracingCapture,
};

/// Longest wait for the tail of stdin to be shipped after EOF.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
pub async fn main() {
    let log_level = env::var(ENV_LOG_LEVEL)
        .map(|val| val.trim().to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,tungstenite=off,{log_level}");

    let capture = TracingCapture::new();
    let filter = match EnvFilter::try_new(&env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log level '{log_level}': {e}, using info");
            EnvFilter::new("h2=off,hyper=off,rustls=off,tungstenite=off,info")
        }
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(Formatter)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    if let Err(e) = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(capture.layer())
        .try_init()
    {
        eprintln!("Failed to install tracing subscriber: {e}");
    }

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e}");
            return;
        }
    };
    debug!("Loaded configuration: {config:?}");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            shutdown.cancel();
        }
    });

    let buffer = EventBuffer::new();
    let client = ClientMetadata::detect(env!("CARGO_PKG_VERSION"));
    let controller = SessionController::from_config(&config).with_source(Arc::new(capture));

    let handle = match controller.start(&config, &client, &buffer, &cancel).await {
        Ok(handle) => handle,
        // Failure details are already logged by the controller.
        Err(_) => return,
    };

    let forwarded = forward_stdin(&buffer, &cancel).await;
    if !cancel.is_cancelled() {
        let deadline = Instant::now() + DRAIN_GRACE;
        while handle.stats().records_sent < forwarded && Instant::now() < deadline {
            tokio::time::sleep(config.flush_interval).await;
        }
    }

    handle.stop().await;
}

/// Enqueues each non-blank stdin line until EOF or cancellation. Returns the
/// number of records enqueued.
async fn forward_stdin(buffer: &EventBuffer, cancel: &CancellationToken) -> u64 {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded = 0;
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                buffer.enqueue(LogRecord::now(level_for_line(&line), line, ""));
                forwarded += 1;
            }
            Ok(None) => {
                debug!("Reached end of input after {forwarded} lines");
                break;
            }
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }
    forwarded
}

/// Picks the level from a leading severity word such as `ERROR:` or `[warn]`.
fn level_for_line(line: &str) -> LogLevel {
    let first = line
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == ':' || c == '|')
        .find(|word| !word.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '[' || c == ']')
        .to_ascii_lowercase();
    match first.as_str() {
        "error" | "err" | "fatal" | "critical" => LogLevel::Error,
        "warn" | "warning" => LogLevel::Warning,
        "assert" => LogLevel::Assert,
        "exception" | "panic" => LogLevel::Exception,
        _ => LogLevel::Info,
    }
}
