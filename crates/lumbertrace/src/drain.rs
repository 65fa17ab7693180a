// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Background task moving records from the [`EventBuffer`] onto the stream.
//!
//! Each cycle sends whatever was left over from the previous cycle, then
//! everything currently buffered, then sleeps for the flush interval. A failed
//! send puts the failed record back at the buffer tail, keeps the rest of the
//! batch in order, and reconnects before the next cycle.
//!
//! ```text
//!   batch [1 2 3 4 5], send of 2 fails
//!     pending <- [3 4 5]     buffer tail <- 2
//!   reconnect
//!   next cycle: pending ++ drain_all() = [3 4 5 2]
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{ConsumerLease, EventBuffer};
use crate::error::SendError;
use crate::record::LogRecord;
use crate::stats::SessionStats;
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

pub struct DrainLoop {
    supervisor: ConnectionSupervisor,
    buffer: EventBuffer,
    uri: String,
    flush_interval: Duration,
    cancel: CancellationToken,
    stats: Arc<SessionStats>,
    pending: VecDeque<LogRecord>,
    // Released when the loop is dropped, after the connection is closed.
    _lease: ConsumerLease,
}

impl DrainLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        supervisor: ConnectionSupervisor,
        buffer: EventBuffer,
        lease: ConsumerLease,
        uri: impl Into<String>,
        flush_interval: Duration,
        cancel: CancellationToken,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            supervisor,
            buffer,
            uri: uri.into(),
            flush_interval,
            cancel,
            stats,
            pending: VecDeque::new(),
            _lease: lease,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the cancellation token fires, then hands unsent records
    /// back to the buffer and closes the connection.
    pub async fn run(mut self) {
        debug!("DRAIN | Started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.flush().await;

            if self.cancel.is_cancelled() {
                break;
            }

            if self.supervisor.state() != ConnectionState::Open {
                match self.supervisor.reconnect(&self.uri, &self.cancel).await {
                    Ok(()) => continue,
                    Err(_) => break,
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.flush_interval) => {}
            }
        }
        self.shutdown().await;
    }

    /// Sends the pending remainder and the current buffer contents, stopping
    /// at the first record that could not be delivered.
    async fn flush(&mut self) {
        let mut batch = std::mem::take(&mut self.pending);
        batch.extend(self.buffer.drain_all());
        if batch.is_empty() {
            return;
        }

        while let Some(record) = batch.pop_front() {
            let payload = match record.to_wire_json() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("DRAIN | Dropping record that failed to serialize: {e}");
                    self.stats.record_dropped();
                    continue;
                }
            };

            match self.supervisor.send(payload, &self.cancel).await {
                Ok(()) => {}
                Err(SendError::Transport(e)) => {
                    warn!(
                        "DRAIN | Send failed, requeueing record and reconnecting: {e} ({} left in batch)",
                        batch.len()
                    );
                    self.buffer.enqueue(record);
                    self.pending = batch;
                    return;
                }
                Err(SendError::NotOpen(_)) | Err(SendError::Cancelled) => {
                    batch.push_front(record);
                    self.pending = batch;
                    return;
                }
            }
        }
    }

    async fn shutdown(mut self) {
        if !self.pending.is_empty() {
            let requeued = self.pending.len();
            self.buffer.requeue_front(self.pending.drain(..));
            debug!("DRAIN | Returned {requeued} unsent records to the buffer");
        }
        self.supervisor.close().await;
        info!("DRAIN | Stopped ({})", self.stats.snapshot());
    }
}
