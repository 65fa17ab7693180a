// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Session lifecycle: authenticate, connect, run the drain loop, stop.
//!
//! ```text
//!  start():
//!    validate config ─> claim buffer ─> authenticate ─> connect ─> attach source ─> spawn DrainLoop
//!          │                 │               │             │              │
//!          └─────────────────┴───────────────┴─────────────┴──────────────┴─> release everything, Err
//!
//!  stop():
//!    cancel ─> detach source (not awaited) ─> join DrainLoop (requeue, close)
//! ```

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::auth::{Authenticator, HttpAuthenticator, SessionToken};
use crate::buffer::EventBuffer;
use crate::capture::LogSource;
use crate::client_details::ClientMetadata;
use crate::config::Config;
use crate::dispatcher::{dispatch, Dispatcher, InlineDispatcher};
use crate::drain::DrainLoop;
use crate::error::StartError;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::supervisor::{ConnectionState, ConnectionSupervisor, ReconnectPolicy};
use crate::transport::{Connector, WebSocketConnector};

pub const STREAM_PATH: &str = "/api/ws/logs";

/// Everything except RFC 3986 unreserved characters.
const TOKEN_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `{ws_endpoint}/api/ws/logs?token={percent-encoded token}`
pub fn stream_uri(ws_endpoint: &str, token: &SessionToken) -> String {
    format!(
        "{}{}?token={}",
        ws_endpoint.trim_end_matches('/'),
        STREAM_PATH,
        utf8_percent_encode(token.as_str(), TOKEN_ENCODE_SET)
    )
}

/// Starts sessions. Holds the injected capabilities; carries no per-session
/// state, so one controller can start many sessions over its lifetime.
#[derive(Clone)]
pub struct SessionController {
    authenticator: Arc<dyn Authenticator>,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<dyn Dispatcher>,
    source: Option<Arc<dyn LogSource>>,
}

impl SessionController {
    pub fn new(authenticator: Arc<dyn Authenticator>, connector: Arc<dyn Connector>) -> Self {
        Self {
            authenticator,
            connector,
            dispatcher: Arc::new(InlineDispatcher),
            source: None,
        }
    }

    /// HTTP credential exchange and a websocket stream.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(HttpAuthenticator::from_config(config)),
            Arc::new(WebSocketConnector),
        )
    }

    /// Context on which the log source is attached and detached.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Capture hook subscribed for the lifetime of each session.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn LogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Authenticates, connects and spawns the drain loop for `buffer`.
    ///
    /// The session stops when the returned handle is stopped or dropped, or
    /// when `cancel` fires. Nothing acquired along the way outlives a failed
    /// or cancelled start.
    pub async fn start(
        &self,
        config: &Config,
        client: &ClientMetadata,
        buffer: &EventBuffer,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle, StartError> {
        let result = self.try_start(config, client, buffer, cancel).await;
        match &result {
            Ok(_) => info!(
                "SESSION | Session started for project {} on {}",
                config.project_id,
                config.ws_endpoint.trim_end_matches('/')
            ),
            Err(e) if e.is_cancelled() => debug!("SESSION | Session start cancelled"),
            Err(e) => error!("SESSION | Failed to start session: {e}"),
        }
        result
    }

    async fn try_start(
        &self,
        config: &Config,
        client: &ClientMetadata,
        buffer: &EventBuffer,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle, StartError> {
        config.validate()?;
        let lease = buffer
            .try_claim_consumer()
            .ok_or(StartError::BufferInUse)?;
        let session_cancel = cancel.child_token();
        let stats = Arc::new(SessionStats::default());

        let token = self
            .authenticator
            .authenticate(
                &config.endpoint,
                &config.project_id,
                &config.api_key,
                client,
                &session_cancel,
            )
            .await?;
        let uri = stream_uri(&config.ws_endpoint, &token);

        let mut supervisor = ConnectionSupervisor::new(
            Arc::clone(&self.connector),
            ReconnectPolicy {
                backoff: config.reconnect_backoff,
                close_timeout: config.close_timeout,
            },
            Arc::clone(&stats),
        );
        if let Err(e) = supervisor.connect(&uri, &session_cancel).await {
            supervisor.close().await;
            return Err(e.into());
        }

        if let Some(source) = &self.source {
            let source = Arc::clone(source);
            let target = buffer.clone();
            if let Err(e) = dispatch(self.dispatcher.as_ref(), move || source.attach(target)).await
            {
                supervisor.close().await;
                return Err(e.into());
            }
        }

        if session_cancel.is_cancelled() {
            detach_source(self.dispatcher.as_ref(), self.source.as_ref());
            supervisor.close().await;
            return Err(StartError::Cancelled);
        }

        let state = supervisor.subscribe();
        let drain_task = DrainLoop::new(
            supervisor,
            buffer.clone(),
            lease,
            uri.clone(),
            config.flush_interval,
            session_cancel.clone(),
            Arc::clone(&stats),
        )
        .spawn();

        Ok(SessionHandle {
            token,
            stream_uri: uri,
            cancel: session_cancel,
            drain_task: Mutex::new(Some(drain_task)),
            state,
            stats,
            buffer: buffer.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            source: self.source.clone(),
        })
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("has_source", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

/// Submits the detach without waiting for it, so stopping never blocks on
/// the dispatcher's context.
fn detach_source(dispatcher: &dyn Dispatcher, source: Option<&Arc<dyn LogSource>>) {
    let Some(source) = source else {
        return;
    };
    let source = Arc::clone(source);
    if let Err(e) = dispatcher.submit(Box::new(move || source.detach())) {
        debug!("SESSION | Could not detach log source: {e}");
    }
}

/// A running session.
pub struct SessionHandle {
    token: SessionToken,
    stream_uri: String,
    cancel: CancellationToken,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<SessionStats>,
    buffer: EventBuffer,
    dispatcher: Arc<dyn Dispatcher>,
    source: Option<Arc<dyn LogSource>>,
}

impl SessionHandle {
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn stream_uri(&self) -> &str {
        &self.stream_uri
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.drain_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops the session and waits for the drain loop to hand back unsent
    /// records and close the connection. Calling it again is a no-op.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self
            .drain_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        detach_source(self.dispatcher.as_ref(), self.source.as_ref());
        if let Err(e) = task.await {
            error!("SESSION | Drain loop ended abnormally: {e}");
        }
        info!("SESSION | Session stopped ({})", self.stats.snapshot());
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        let task = self
            .drain_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        detach_source(self.dispatcher.as_ref(), self.source.as_ref());
        // Nobody joins the loop any more; report an abnormal end from a
        // detached watcher instead.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = task.await {
                        error!("SESSION | Drain loop ended abnormally: {e}");
                    }
                });
            }
            Err(_) => {
                debug!("SESSION | Handle dropped outside a runtime, drain loop not watched");
            }
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.connection_state())
            .field("running", &self.is_running())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
