// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

use lumbertrace::{ClientMetadata, Config, LogLevel, LogRecord};
use std::time::{Duration, Instant};

pub fn test_config(endpoint: &str, ws_endpoint: &str) -> Config {
    Config {
        endpoint: endpoint.to_string(),
        ws_endpoint: ws_endpoint.to_string(),
        flush_interval: Duration::from_millis(20),
        reconnect_backoff: Duration::from_millis(50),
        close_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_secs(5),
        ..Config::new("test-project", "test-api-key")
    }
}

pub fn test_client() -> ClientMetadata {
    ClientMetadata::new("test-rig", "linux-x86_64", "0.1.0")
}

pub fn record(message: &str) -> LogRecord {
    LogRecord::new(LogLevel::Info, message, "", 0)
}

/// Extracts the `message` field from wire payloads.
pub fn messages(payloads: &[String]) -> Vec<String> {
    payloads
        .iter()
        .map(|payload| {
            let value: serde_json::Value = serde_json::from_str(payload).unwrap();
            value["message"].as_str().unwrap().to_string()
        })
        .collect()
}

/// Polls `condition` until it holds, panicking after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + limit;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {limit:?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
