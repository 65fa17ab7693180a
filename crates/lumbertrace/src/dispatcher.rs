// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Runs host-affine work on the context that owns it.
//!
//! Some hosts only allow their global hooks to be touched from one thread.
//! The session submits those calls through a [`Dispatcher`] instead of
//! running them wherever `start`/`stop` happen to execute.

use std::fmt;
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::DispatchError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Queues `job` for execution. Returns once the job is accepted, not
    /// once it has run.
    fn submit(&self, job: Job) -> Result<(), DispatchError>;
}

/// Submits `f` and waits for its result.
pub async fn dispatch<D, F, T>(dispatcher: &D, f: F) -> Result<T, DispatchError>
where
    D: Dispatcher + ?Sized,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    dispatcher.submit(Box::new(move || {
        // The waiter may have given up; nothing to report then.
        let _ = tx.send(f());
    }))?;
    rx.await.map_err(|_| DispatchError::Dropped)
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn submit(&self, job: Job) -> Result<(), DispatchError> {
        job();
        Ok(())
    }
}

/// Runs jobs in order on one dedicated OS thread.
pub struct ThreadDispatcher {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    thread_id: thread::ThreadId,
}

impl ThreadDispatcher {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                debug!("Dispatcher thread exiting");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
        })
    }

    /// True when called from the dispatcher's own thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stops accepting jobs. Jobs already queued still run.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Dispatcher for ThreadDispatcher {
    fn submit(&self, job: Job) -> Result<(), DispatchError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(DispatchError::Closed);
        };
        sender.send(job).map_err(|_| {
            error!("Dispatcher thread is gone, rejecting job");
            DispatchError::Closed
        })
    }
}

impl fmt::Debug for ThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDispatcher")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}
