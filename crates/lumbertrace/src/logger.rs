// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Log line format for the pipeline's own diagnostics.
//!
//! ```text
//! LUMBERTRACE | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! ```text
//! LUMBERTRACE | INFO | SESSION | Session started
//! LUMBERTRACE | WARN | DRAIN | Send failed, requeueing record and reconnecting: ...
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

pub const LOG_PREFIX: &str = "LUMBERTRACE";

/// Prefixes every line with `LUMBERTRACE` so pipeline diagnostics stand out
/// from the host application's own output.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{LOG_PREFIX} | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
