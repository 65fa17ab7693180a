// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

use crate::supervisor::ConnectionState;

/// Errors raised while loading or validating [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Outcome of a failed credential exchange.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication rejected: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("Authentication request failed: {0}")]
    Request(String),

    #[error("Authentication cancelled")]
    Cancelled,
}

/// Failures reported by a [`crate::transport::Transport`] or its connector.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Connection closed by peer")]
    Closed,

    #[error("{0}")]
    Other(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Failed to connect: {0}")]
    Transport(#[from] TransportError),

    #[error("Connect is only valid while disconnected (state: {0:?})")]
    InvalidState(ConnectionState),

    #[error("Connect cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Connection is not open (state: {0:?})")]
    NotOpen(ConnectionState),

    #[error("Failed to send: {0}")]
    Transport(#[from] TransportError),

    #[error("Send cancelled")]
    Cancelled,
}

/// The reconnect policy never gives up on its own, so cancellation is its
/// only way out without a connection.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    #[error("Reconnect cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatcher is shut down")]
    Closed,

    #[error("Dispatched work was dropped before completing")]
    Dropped,
}

/// Reasons a session could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Event buffer is already consumed by another session")]
    BufferInUse,

    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Connect(ConnectError),

    #[error("Failed to attach log source: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Session start cancelled")]
    Cancelled,
}

impl StartError {
    /// True when startup stopped because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StartError::Cancelled)
    }
}

impl From<AuthError> for StartError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Cancelled => StartError::Cancelled,
            other => StartError::Auth(other),
        }
    }
}

impl From<ConnectError> for StartError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Cancelled => StartError::Cancelled,
            other => StartError::Connect(other),
        }
    }
}
