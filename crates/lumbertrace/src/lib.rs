// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Client-side log shipping.
//!
//! Host code enqueues [`LogRecord`]s into an [`EventBuffer`] from any thread.
//! A [`SessionController`] exchanges credentials for a session token, opens a
//! websocket stream to the collector and spawns a drain loop that forwards the
//! buffer every flush interval, reconnecting on failure until the session is
//! stopped.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod auth;
pub mod buffer;
pub mod capture;
pub mod client_details;
pub mod config;
pub mod dispatcher;
pub mod drain;
pub mod error;
pub mod http;
pub mod logger;
pub mod record;
pub mod session;
pub mod stats;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use auth::{Authenticator, HttpAuthenticator, SessionToken};
pub use buffer::EventBuffer;
pub use capture::{LogSource, TracingCapture};
pub use client_details::ClientMetadata;
pub use config::Config;
pub use dispatcher::{Dispatcher, InlineDispatcher, ThreadDispatcher};
pub use error::StartError;
pub use record::{LogLevel, LogRecord};
pub use session::{SessionController, SessionHandle};
pub use stats::StatsSnapshot;
pub use supervisor::ConnectionState;
pub use transport::{Connector, Transport, WebSocketConnector};
