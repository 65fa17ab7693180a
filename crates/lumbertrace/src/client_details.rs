// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Device, platform and version strings reported during the credential exchange.

use std::env;
use tracing::warn;

const ENV_DEVICE: &str = "LUMBERTRACE_DEVICE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMetadata {
    pub device: String,
    pub platform: String,
    pub version: String,
}

impl ClientMetadata {
    pub fn new(
        device: impl Into<String>,
        platform: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            platform: platform.into(),
            version: version.into(),
        }
    }

    /// Fills device and platform from the running host; `version` is the
    /// host application's own version.
    pub fn detect(version: impl Into<String>) -> Self {
        Self::new(device_name(), platform_name(), version)
    }
}

/// Returns `<os>-<arch>`, e.g. `linux-x86_64`.
pub fn platform_name() -> String {
    format!("{}-{}", env::consts::OS, env::consts::ARCH)
}

/// Best-effort device name:
/// 1. `LUMBERTRACE_DEVICE`
/// 2. `HOSTNAME` (or `COMPUTERNAME` on Windows)
/// 3. the system hostname
/// 4. `"unknown"`
pub fn device_name() -> String {
    for key in [ENV_DEVICE, "HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = env::var(key) {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }

    if let Some(hostname) = system_hostname() {
        return hostname;
    }

    warn!("Could not determine device name, using 'unknown'");
    "unknown".to_string()
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname
            .to_str()
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!("Failed to get system hostname: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    None
}
