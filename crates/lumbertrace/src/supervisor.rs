// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection lifecycle: connect, send, detect failure, reconnect, close.
//!
//! # State machine
//!
//! ```text
//!                connect()                 ok
//!  Disconnected ───────────> Connecting ─────────> Open
//!       ^                        │ err                │ send() err
//!       │ cancelled              v                    v
//!       ├─────────────────── (Disconnected)  Failed <─┘
//!       │                                      │
//!       │        close()                       │ close()
//!       └──────── Closing <────────────────────┴──── Open
//! ```
//!
//! `reconnect()` loops `close -> connect` with a fixed backoff until the
//! connection is open or the cancellation token fires. It never gives up on
//! its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ConnectError, ReconnectError, SendError};
use crate::stats::SessionStats;
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Failed,
}

/// Timing knobs for [`ConnectionSupervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Constant delay between reconnect attempts; no growth, no jitter
    pub backoff: Duration,
    /// Upper bound on waiting for the close handshake
    pub close_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: crate::config::DEFAULT_RECONNECT_BACKOFF,
            close_timeout: crate::config::DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Exclusive owner of the stream connection.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    transport: Option<Box<dyn Transport>>,
    state_tx: watch::Sender<ConnectionState>,
    stats: Arc<SessionStats>,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        stats: Arc<SessionStats>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            policy,
            transport: None,
            state_tx,
            stats,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observes state transitions without touching the connection.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Opens a connection to `uri`. Only valid while `Disconnected`.
    pub async fn connect(
        &mut self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConnectError> {
        let state = self.state();
        if state != ConnectionState::Disconnected {
            return Err(ConnectError::InvalidState(state));
        }

        self.set_state(ConnectionState::Connecting);
        let connector = Arc::clone(&self.connector);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.set_state(ConnectionState::Disconnected);
                return Err(ConnectError::Cancelled);
            }
            result = connector.connect(uri) => result,
        };

        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                self.set_state(ConnectionState::Open);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                Err(ConnectError::Transport(e))
            }
        }
    }

    /// Sends one text frame. A transport failure moves the supervisor to
    /// `Failed`; the caller owns requeueing and reconnecting.
    pub async fn send(
        &mut self,
        payload: String,
        cancel: &CancellationToken,
    ) -> Result<(), SendError> {
        let state = self.state();
        let Some(transport) = self.transport.as_mut().filter(|_| state == ConnectionState::Open)
        else {
            return Err(SendError::NotOpen(state));
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SendError::Cancelled),
            result = transport.send_text(payload) => result,
        };

        match result {
            Ok(()) => {
                self.stats.record_sent();
                Ok(())
            }
            Err(e) => {
                self.stats.record_send_failure();
                self.set_state(ConnectionState::Failed);
                Err(SendError::Transport(e))
            }
        }
    }

    /// Retries `close -> connect` every `policy.backoff` until the connection
    /// is open or `cancel` fires.
    pub async fn reconnect(
        &mut self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ReconnectError> {
        info!("STREAM | Attempting reconnect");
        loop {
            if cancel.is_cancelled() {
                return Err(ReconnectError::Cancelled);
            }

            self.close().await;
            self.stats.record_reconnect_attempt();
            match self.connect(uri, cancel).await {
                Ok(()) => {
                    self.stats.record_reconnect();
                    info!("STREAM | Reconnected");
                    return Ok(());
                }
                Err(ConnectError::Cancelled) => return Err(ReconnectError::Cancelled),
                Err(e) => warn!("STREAM | Reconnect attempt failed: {e}"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReconnectError::Cancelled),
                _ = tokio::time::sleep(self.policy.backoff) => {}
            }
        }
    }

    /// Best-effort close. The transport is always released and the state
    /// reset to `Disconnected`, whatever the handshake outcome.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            self.set_state(ConnectionState::Closing);
            match timeout(self.policy.close_timeout, transport.close()).await {
                Ok(Ok(())) => debug!("STREAM | Connection closed"),
                Ok(Err(e)) => debug!("STREAM | Ignoring close error: {e}"),
                Err(_) => debug!(
                    "STREAM | Close handshake timed out after {:?}",
                    self.policy.close_timeout
                ),
            }
            drop(transport);
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .finish()
    }
}
