// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Hooks that feed host log events into an [`EventBuffer`].
//!
//! A session attaches its buffer to a [`LogSource`] when it starts and
//! detaches it when it stops. [`TracingCapture`] is the source for hosts that
//! log through `tracing`: install [`TracingCapture::layer`] in the host's
//! subscriber once, and events flow into whichever buffer is attached.

use std::fmt::{self, Write as _};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::buffer::EventBuffer;
use crate::record::{LogLevel, LogRecord};

/// Targets never shipped, so the pipeline does not forward its own chatter.
const IGNORED_TARGETS: &[&str] = &[
    "lumbertrace",
    "tungstenite",
    "tokio_tungstenite",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio_rustls",
    "mio",
    "want",
];

/// A capture hook the session subscribes to while it runs.
pub trait LogSource: Send + Sync {
    fn attach(&self, buffer: EventBuffer);

    fn detach(&self);
}

/// [`LogSource`] backed by a `tracing` layer.
#[derive(Clone, Default)]
pub struct TracingCapture {
    target: Arc<RwLock<Option<EventBuffer>>>,
}

impl TracingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer to install in the host's subscriber. Captures nothing until a
    /// buffer is attached.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            target: Arc::clone(&self.target),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl LogSource for TracingCapture {
    fn attach(&self, buffer: EventBuffer) {
        *self.target.write().unwrap_or_else(PoisonError::into_inner) = Some(buffer);
        tracing::debug!("CAPTURE | Attached");
    }

    fn detach(&self) {
        self.target
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!("CAPTURE | Detached");
    }
}

impl fmt::Debug for TracingCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingCapture")
            .field("attached", &self.is_attached())
            .finish()
    }
}

pub struct CaptureLayer {
    target: Arc<RwLock<Option<EventBuffer>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // Records bridged from `log` carry their real target in fields.
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());
        if is_ignored(metadata.target()) {
            return;
        }

        let guard = self.target.read().unwrap_or_else(PoisonError::into_inner);
        let Some(buffer) = guard.as_ref() else {
            return;
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut stacktrace = String::new();
        if let Some(file) = metadata.file() {
            let _ = write!(stacktrace, "at {}", metadata.module_path().unwrap_or(metadata.target()));
            let _ = match metadata.line() {
                Some(line) => write!(stacktrace, " ({file}:{line})"),
                None => write!(stacktrace, " ({file})"),
            };
        }
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if !stacktrace.is_empty() {
                    stacktrace.push('\n');
                }
                let _ = write!(stacktrace, "in {}::{}", span.metadata().target(), span.name());
            }
        }

        buffer.enqueue(LogRecord::now(
            LogLevel::from(*metadata.level()),
            visitor.finish(),
            stacktrace,
        ));
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::") || rest.starts_with('_'))
    })
}

/// Collects the `message` field and renders the rest as `key=value`.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: String,
}

impl FieldVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if name.starts_with("log.") {
            return;
        }
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
