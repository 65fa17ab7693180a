// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-producer, single-consumer record queue.
//!
//! Producers hold cheap clones of [`EventBuffer`] and call [`EventBuffer::enqueue`]
//! from any thread. The queue is an unbounded channel, so enqueueing never
//! blocks and never drops. Exactly one drain loop consumes it at a time; that
//! exclusivity is expressed by the [`ConsumerLease`] returned from
//! [`EventBuffer::try_claim_consumer`].
//!
//! ```text
//!   producer ─┐
//!   producer ─┼─> unbounded mpsc ──> drain_all() ──> drain loop
//!   producer ─┘            ^
//!                          └── requeue_front() (unsent records at shutdown)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::record::LogRecord;

#[derive(Clone)]
pub struct EventBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    tx: mpsc::UnboundedSender<LogRecord>,
    // Only the drain loop touches the consumer side; the mutex is never
    // contended by producers.
    rx: Mutex<ConsumerSide>,
    queued: AtomicUsize,
    consumer_claimed: AtomicBool,
}

struct ConsumerSide {
    /// Records handed back by a consumer; always older than anything in `rx`.
    front: VecDeque<LogRecord>,
    rx: mpsc::UnboundedReceiver<LogRecord>,
}

impl EventBuffer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        EventBuffer {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(ConsumerSide {
                    front: VecDeque::new(),
                    rx,
                }),
                queued: AtomicUsize::new(0),
                consumer_claimed: AtomicBool::new(false),
            }),
        }
    }

    /// Appends a record to the tail of the queue.
    pub fn enqueue(&self, record: LogRecord) {
        // Counted before the send so a concurrent drain never observes the
        // record without its count. The receiver lives as long as `inner`, so
        // the send cannot fail.
        self.inner.queued.fetch_add(1, Ordering::Relaxed);
        if self.inner.tx.send(record).is_err() {
            self.inner.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Removes and returns every queued record in FIFO order.
    ///
    /// Records enqueued concurrently with the call may or may not be included.
    pub fn drain_all(&self) -> Vec<LogRecord> {
        let mut side = self.inner.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained: Vec<LogRecord> = side.front.drain(..).collect();
        while let Ok(record) = side.rx.try_recv() {
            drained.push(record);
        }
        self.inner.queued.fetch_sub(drained.len(), Ordering::Relaxed);
        drained
    }

    /// Puts records taken by an earlier [`EventBuffer::drain_all`] back at the
    /// head of the queue, ahead of everything enqueued since, keeping their
    /// order. Producers are never blocked.
    pub fn requeue_front(&self, records: impl IntoIterator<Item = LogRecord>) {
        let mut side = self.inner.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records: VecDeque<LogRecord> = records.into_iter().collect();
        self.inner.queued.fetch_add(records.len(), Ordering::Relaxed);
        records.append(&mut side.front);
        side.front = records;
    }

    /// Number of records currently queued.
    pub fn len(&self) -> usize {
        self.inner.queued.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claims the single consumer slot, or returns `None` if a drain loop
    /// already owns it. The slot is released when the lease is dropped.
    pub fn try_claim_consumer(&self) -> Option<ConsumerLease> {
        self.inner
            .consumer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ConsumerLease {
                inner: Arc::clone(&self.inner),
            })
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("queued", &self.len())
            .field(
                "consumer_claimed",
                &self.inner.consumer_claimed.load(Ordering::Relaxed),
            )
            .finish()
    }
}

/// Exclusive right to consume an [`EventBuffer`].
pub struct ConsumerLease {
    inner: Arc<Inner>,
}

impl Drop for ConsumerLease {
    fn drop(&mut self) {
        self.inner.consumer_claimed.store(false, Ordering::Release);
    }
}

impl fmt::Debug for ConsumerLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConsumerLease")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use proptest::prelude::*;
    use std::thread;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, message, "", 0)
    }

    fn messages(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.message.as_str()).collect()
    }

    #[test]
    fn drain_returns_records_in_enqueue_order() {
        let buffer = EventBuffer::new();
        buffer.enqueue(record("a"));
        buffer.enqueue(record("b"));
        buffer.enqueue(record("c"));
        assert_eq!(buffer.len(), 3);

        let drained = buffer.drain_all();
        assert_eq!(messages(&drained), vec!["a", "b", "c"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_on_empty_buffer_is_empty_and_idempotent() {
        let buffer = EventBuffer::new();
        assert!(buffer.drain_all().is_empty());

        buffer.enqueue(record("only"));
        assert_eq!(buffer.drain_all().len(), 1);
        assert!(buffer.drain_all().is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let buffer = EventBuffer::new();
        let producer = buffer.clone();
        producer.enqueue(record("from clone"));
        assert_eq!(messages(&buffer.drain_all()), vec!["from clone"]);
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let buffer = EventBuffer::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        buffer.enqueue(record(&format!("{p}:{i}")));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        while drained.len() < 1000 {
            drained.extend(buffer.drain_all());
            thread::yield_now();
        }
        for handle in producers {
            handle.join().unwrap();
        }
        drained.extend(buffer.drain_all());
        assert_eq!(drained.len(), 1000);

        for p in 0..4 {
            let prefix = format!("{p}:");
            let sequence: Vec<usize> = drained
                .iter()
                .filter_map(|r| r.message.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(sequence, (0..250).collect::<Vec<_>>());
        }
    }

    #[test]
    fn only_one_consumer_at_a_time() {
        let buffer = EventBuffer::new();
        let lease = buffer.try_claim_consumer().expect("first claim succeeds");
        assert!(buffer.try_claim_consumer().is_none());
        assert!(buffer.clone().try_claim_consumer().is_none());

        drop(lease);
        assert!(buffer.try_claim_consumer().is_some());
    }

    #[test]
    fn requeued_records_come_back_first() {
        let buffer = EventBuffer::new();
        for message in ["1", "2", "3"] {
            buffer.enqueue(record(message));
        }
        let taken = buffer.drain_all();
        buffer.enqueue(record("4"));
        buffer.requeue_front(taken.into_iter().skip(1));
        buffer.requeue_front(vec![record("0")]);

        assert_eq!(buffer.len(), 4);
        assert_eq!(messages(&buffer.drain_all()), vec!["0", "2", "3", "4"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn requeue_during_concurrent_enqueue_keeps_producer_order() {
        let buffer = EventBuffer::new();
        for i in 0..50 {
            buffer.enqueue(record(&format!("p:{i}")));
        }
        let taken = buffer.drain_all();

        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 50..2000 {
                    buffer.enqueue(record(&format!("p:{i}")));
                }
            })
        };
        thread::yield_now();
        buffer.requeue_front(taken);
        producer.join().unwrap();

        let sequence: Vec<usize> = buffer
            .drain_all()
            .iter()
            .map(|r| r.message.strip_prefix("p:").unwrap().parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..2000).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn single_producer_fifo(batches in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..20), 0..10)) {
            let buffer = EventBuffer::new();
            let mut expected = Vec::new();
            let mut observed = Vec::new();
            for batch in batches {
                for value in batch {
                    buffer.enqueue(record(&value.to_string()));
                    expected.push(value.to_string());
                }
                observed.extend(buffer.drain_all().into_iter().map(|r| r.message));
            }
            observed.extend(buffer.drain_all().into_iter().map(|r| r.message));
            prop_assert_eq!(observed, expected);
        }
    }
}
