// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory connector used by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// The next `n` connect calls fail
    FailConnects(usize),
    /// Connect calls never complete
    HangConnects,
    /// The n-th send (1-based, counted across connections) fails once
    FailSendNumber(usize),
    /// Every send fails
    FailAllSends,
    PanicOnSend,
    FailClose,
    HangClose,
}

#[derive(Default)]
struct State {
    fail_connects: AtomicUsize,
    hang_connects: AtomicBool,
    fail_send_number: AtomicUsize,
    fail_all_sends: AtomicBool,
    panic_on_send: AtomicBool,
    fail_close: AtomicBool,
    hang_close: AtomicBool,

    connect_attempts: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    released: AtomicUsize,
    send_attempts: AtomicUsize,
    uris: Mutex<Vec<String>>,
    delivered: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<State>,
}

impl MockConnector {
    pub(crate) fn script(&self, script: Script) {
        let s = &self.state;
        match script {
            Script::FailConnects(n) => s.fail_connects.store(n, Ordering::SeqCst),
            Script::HangConnects => s.hang_connects.store(true, Ordering::SeqCst),
            Script::FailSendNumber(n) => s.fail_send_number.store(n, Ordering::SeqCst),
            Script::FailAllSends => s.fail_all_sends.store(true, Ordering::SeqCst),
            Script::PanicOnSend => s.panic_on_send.store(true, Ordering::SeqCst),
            Script::FailClose => s.fail_close.store(true, Ordering::SeqCst),
            Script::HangClose => s.hang_close.store(true, Ordering::SeqCst),
        }
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub(crate) fn uris(&self) -> Vec<String> {
        self.state.uris.lock().unwrap().clone()
    }

    pub(crate) fn delivered(&self) -> Vec<String> {
        self.state.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Transport>, TransportError> {
        let s = &self.state;
        s.connect_attempts.fetch_add(1, Ordering::SeqCst);
        s.uris.lock().unwrap().push(uri.to_string());

        if s.hang_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let failing = s
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Other("connection refused".into()));
        }

        s.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport {
            state: Arc::clone(s),
        }))
    }
}

struct MockTransport {
    state: Arc<State>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError> {
        let s = &self.state;
        let attempt = s.send_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if s.panic_on_send.load(Ordering::SeqCst) {
            panic!("transport panicked on send");
        }
        if s.fail_all_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if s
            .fail_send_number
            .compare_exchange(attempt, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return Err(TransportError::Closed);
        }
        s.delivered.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let s = &self.state;
        s.closed.fetch_add(1, Ordering::SeqCst);
        if s.hang_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if s.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Other("close handshake failed".into()));
        }
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
