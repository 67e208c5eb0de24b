//! # Input Sources
//!
//! The decoder pulls raw byte chunks through the [`InputSource`] trait:
//! `get_input` blocks until a chunk is available and returns an empty
//! chunk at the end of the stream; `input_done` is monotonic — once true
//! it stays true. Chunks may be any size, including empty; the decoder
//! re-splices them into its own window.
//!
//! Three implementations:
//!
//! - [`ChunkQueue`] / [`ChunkSender`]: the SPSC channel feeding a decoder
//!   worker from another thread. Closing (or dropping) the sender is the
//!   cancellation signal: the decoder finishes at most the current dataset
//!   and flushes.
//! - [`SliceSource`]: a fixed chunk schedule over in-memory bytes, used by
//!   tests to exercise arbitrary fragmentation.
//! - [`ReadSource`]: pulls fixed-size chunks from any `std::io::Read`.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::{CHUNK_QUEUE_CAPACITY, READ_SOURCE_CHUNK};

pub trait InputSource: Send {
    /// The next chunk of raw bytes. Blocks until one is available; an
    /// empty chunk together with `input_done()` means end of stream.
    fn get_input(&mut self) -> Vec<u8>;

    /// True once the stream has ended. Monotonic.
    fn input_done(&self) -> bool;
}

struct ChunkShared {
    state: Mutex<ChunkState>,
    cond: Condvar,
}

struct ChunkState {
    chunks: VecDeque<Vec<u8>>,
    closed: bool,
}

/// Producer half of the chunk channel.
pub struct ChunkSender {
    shared: Arc<ChunkShared>,
}

/// Consumer half of the chunk channel; the decoder's input source.
pub struct ChunkQueue {
    shared: Arc<ChunkShared>,
    done: bool,
}

pub fn chunk_queue() -> (ChunkSender, ChunkQueue) {
    let shared = Arc::new(ChunkShared {
        state: Mutex::new(ChunkState {
            chunks: VecDeque::new(),
            closed: false,
        }),
        cond: Condvar::new(),
    });
    (
        ChunkSender {
            shared: Arc::clone(&shared),
        },
        ChunkQueue {
            shared,
            done: false,
        },
    )
}

impl ChunkSender {
    /// Enqueue a chunk, blocking while the queue is at capacity. Fails
    /// once the queue is closed.
    pub fn send(&self, chunk: Vec<u8>) -> Result<(), super::QueueClosed> {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return Err(super::QueueClosed);
            }
            if state.chunks.len() < CHUNK_QUEUE_CAPACITY {
                state.chunks.push_back(chunk);
                self.shared.cond.notify_all();
                return Ok(());
            }
            self.shared.cond.wait(&mut state);
        }
    }

    /// End the stream. The decoder drains pending chunks, then sees the
    /// end of input.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.cond.notify_all();
    }
}

impl Drop for ChunkSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl InputSource for ChunkQueue {
    fn get_input(&mut self) -> Vec<u8> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(chunk) = state.chunks.pop_front() {
                self.shared.cond.notify_all();
                return chunk;
            }
            if state.closed {
                self.done = true;
                return Vec::new();
            }
            self.shared.cond.wait(&mut state);
        }
    }

    fn input_done(&self) -> bool {
        self.done
    }
}

/// A pre-planned chunk schedule over in-memory bytes.
pub struct SliceSource {
    chunks: VecDeque<Vec<u8>>,
    done: bool,
}

impl SliceSource {
    /// Split `data` into chunks of `chunk_size` bytes (the last one may be
    /// shorter).
    pub fn new(data: &[u8], chunk_size: usize) -> SliceSource {
        assert!(chunk_size > 0);
        SliceSource {
            chunks: data.chunks(chunk_size).map(<[u8]>::to_vec).collect(),
            done: false,
        }
    }

    /// Use an explicit chunk sequence, empty chunks included.
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> SliceSource {
        SliceSource {
            chunks: chunks.into(),
            done: false,
        }
    }
}

impl InputSource for SliceSource {
    fn get_input(&mut self) -> Vec<u8> {
        match self.chunks.pop_front() {
            Some(chunk) => chunk,
            None => {
                self.done = true;
                Vec::new()
            }
        }
    }

    fn input_done(&self) -> bool {
        self.done
    }
}

/// Pulls fixed-size chunks from a blocking reader. Read errors other than
/// interruption end the stream; the decoder then reports a premature end
/// if it was mid-dataset.
pub struct ReadSource<R: Read + Send> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read + Send> ReadSource<R> {
    pub fn new(reader: R) -> ReadSource<R> {
        ReadSource::with_chunk_size(reader, READ_SOURCE_CHUNK)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> ReadSource<R> {
        assert!(chunk_size > 0);
        ReadSource {
            reader,
            chunk_size,
            done: false,
        }
    }
}

impl<R: Read + Send> InputSource for ReadSource<R> {
    fn get_input(&mut self) -> Vec<u8> {
        if self.done {
            return Vec::new();
        }
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.done = true;
                    return Vec::new();
                }
                Ok(n) => {
                    chunk.truncate(n);
                    return chunk;
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.done = true;
                    return Vec::new();
                }
            }
        }
    }

    fn input_done(&self) -> bool {
        self.done
    }
}
