// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP client used for the credential exchange.

use crate::config::Config;
use std::error::Error;
use std::time::Duration;
use tracing::error;

/// Builds the reqwest client for `config`.
///
/// An unusable proxy setting is logged and the client falls back to a direct
/// connection, so a bad proxy never prevents a session from starting.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(https_uri.clone())?);
        }
    }

    Ok(client.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_valid_proxy() {
        let config = Config {
            https_proxy: Some("https://proxy.example:3128".to_string()),
            ..Config::new("proj", "key")
        };
        assert!(build_client(&config, true).is_ok());
    }

    #[test]
    fn test_invalid_proxy_falls_back() {
        let config = Config {
            https_proxy: Some("http://[::1".to_string()),
            ..Config::new("proj", "key")
        };
        assert!(build_client(&config, true).is_err());
        // Falls back instead of failing.
        let _client = get_client(&config);
    }
}
