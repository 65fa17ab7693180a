// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Mock authenticators and transports for session tests

use async_trait::async_trait;
use lumbertrace::error::{AuthError, TransportError};
use lumbertrace::{Authenticator, ClientMetadata, Connector, SessionToken, Transport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Authenticator that returns a fixed token and records the endpoint it was
/// called with.
pub struct MockAuthenticator {
    token: String,
    pub endpoints: Mutex<Vec<String>>,
}

impl MockAuthenticator {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            endpoints: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(
        &self,
        endpoint: &str,
        _project_id: &str,
        _api_key: &str,
        _client: &ClientMetadata,
        _cancel: &CancellationToken,
    ) -> Result<SessionToken, AuthError> {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        Ok(SessionToken::new(self.token.as_str()))
    }
}

/// Authenticator that never answers; only cancellation ends the call.
pub struct HangingAuthenticator;

#[async_trait]
impl Authenticator for HangingAuthenticator {
    async fn authenticate(
        &self,
        _endpoint: &str,
        _project_id: &str,
        _api_key: &str,
        _client: &ClientMetadata,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, AuthError> {
        cancel.cancelled().await;
        Err(AuthError::Cancelled)
    }
}

#[derive(Default)]
struct Counters {
    connect_attempts: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    dropped: AtomicUsize,
    sends: AtomicUsize,
    fail_send_number: AtomicUsize,
    refuse_connects: AtomicBool,
    connect_delay_ms: AtomicUsize,
    uris: Mutex<Vec<String>>,
    delivered: Mutex<Vec<String>>,
}

/// Connector whose transports record every payload and count their own
/// opens, closes and drops.
#[derive(Clone, Default)]
pub struct CountingConnector {
    counters: Arc<Counters>,
}

impl CountingConnector {
    /// The n-th send (1-based, across connections) fails once.
    pub fn fail_send_number(&self, n: usize) {
        self.counters.fail_send_number.store(n, Ordering::SeqCst);
    }

    /// Every connect attempt after this call fails.
    pub fn refuse_connects(&self, refuse: bool) {
        self.counters.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Connects take `delay` before succeeding.
    pub fn delay_connects(&self, delay: Duration) {
        self.counters
            .connect_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.counters.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.counters.dropped.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.counters.uris.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.counters.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Transport>, TransportError> {
        let counters = &self.counters;
        counters.connect_attempts.fetch_add(1, Ordering::SeqCst);
        counters.uris.lock().unwrap().push(uri.to_string());

        let delay = counters.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if counters.refuse_connects.load(Ordering::SeqCst) {
            return Err(TransportError::Other("connection refused".to_string()));
        }

        counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingTransport {
            counters: Arc::clone(counters),
            closed: false,
        }))
    }
}

struct CountingTransport {
    counters: Arc<Counters>,
    closed: bool,
}

#[async_trait]
impl Transport for CountingTransport {
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError> {
        let attempt = self.counters.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .counters
            .fail_send_number
            .compare_exchange(attempt, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return Err(TransportError::Closed);
        }
        self.counters.delivered.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        assert!(!self.closed, "transport closed twice");
        self.closed = true;
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for CountingTransport {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
