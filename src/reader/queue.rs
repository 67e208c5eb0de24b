//! # Bounded Buffer Hand-Off Queue
//!
//! One-producer, one-consumer FIFO carrying finished buffers from the
//! decoder worker to the consumer. The producer blocks once
//! `BUFFER_QUEUE_CAPACITY` buffers are in flight (backpressure); the
//! consumer blocks until a buffer arrives. Dropping either side closes the
//! queue: a closed queue unblocks the producer with [`QueueClosed`] and
//! hands the consumer a synthesized end-of-stream sentinel once the
//! remaining items are drained.
//!
//! Synchronization is a `parking_lot` mutex plus condvar, shared by both
//! directions; the queue is small enough that a single lock is never
//! contended meaningfully.

use std::collections::VecDeque;
use std::sync::Arc;

use eyre::Result;
use parking_lot::{Condvar, Mutex};

use crate::buffer::Buffer;
use crate::config::BUFFER_QUEUE_CAPACITY;

/// The other side of the queue went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl std::fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("buffer queue closed")
    }
}

impl std::error::Error for QueueClosed {}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    items: VecDeque<Result<Buffer>>,
    closed: bool,
}

pub struct BufferSender {
    shared: Arc<Shared>,
}

pub struct BufferReceiver {
    shared: Arc<Shared>,
}

pub fn buffer_queue() -> (BufferSender, BufferReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            items: VecDeque::new(),
            closed: false,
        }),
        cond: Condvar::new(),
    });
    (
        BufferSender {
            shared: Arc::clone(&shared),
        },
        BufferReceiver { shared },
    )
}

impl BufferSender {
    /// Enqueue a buffer (or a terminal error), blocking while the queue is
    /// at capacity.
    pub fn send(&self, item: Result<Buffer>) -> Result<(), QueueClosed> {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return Err(QueueClosed);
            }
            if state.items.len() < BUFFER_QUEUE_CAPACITY {
                state.items.push_back(item);
                self.shared.cond.notify_all();
                return Ok(());
            }
            self.shared.cond.wait(&mut state);
        }
    }
}

impl Drop for BufferSender {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.cond.notify_all();
    }
}

impl BufferReceiver {
    /// Dequeue the next buffer, blocking until one arrives. After the
    /// producer is gone and the queue is drained, returns the empty
    /// sentinel buffer.
    pub fn recv(&self) -> Result<Buffer> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.shared.cond.notify_all();
                return item;
            }
            if state.closed {
                return Ok(Buffer::default());
            }
            self.shared.cond.wait(&mut state);
        }
    }
}

impl Drop for BufferReceiver {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.items.clear();
        self.shared.cond.notify_all();
    }
}
