// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Delivery counters for a running session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Session counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct SessionStats {
    records_sent: AtomicU64,
    send_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
    records_dropped: AtomicU64,
}

impl SessionStats {
    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_sent: self.records_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Plain data view of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records the transport accepted.
    pub records_sent: u64,
    /// Sends that failed and triggered a reconnect.
    pub send_failures: u64,
    pub reconnect_attempts: u64,
    /// Reconnect cycles that ended with an open connection.
    pub reconnects: u64,
    /// Records that could not be serialized and were discarded.
    pub records_dropped: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records_sent={}, send_failures={}, reconnect_attempts={}, reconnects={}, records_dropped={}",
            self.records_sent,
            self.send_failures,
            self.reconnect_attempts,
            self.reconnects,
            self.records_dropped
        )
    }
}
