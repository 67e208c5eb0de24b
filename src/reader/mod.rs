//! # Reader Harness
//!
//! The plumbing around a decoder instance: the input chunk channel, the
//! output buffer queue, the one-shot header hand-off, buffer rotation and
//! the worker thread. Each decoder runs on a single dedicated worker; all
//! cross-thread traffic goes through the two SPSC queues, and a buffer is
//! owned by exactly one side at any time.
//!
//! ```text
//! producer thread          worker thread                 consumer thread
//! ChunkSender ──chunks──▶ O5mDecoder ──▶ OutputSink ──▶ BufferReceiver
//!                              │
//!                              └──────▶ HeaderSlot  ──▶ header()
//! ```
//!
//! Cancellation: close (or drop) the `ChunkSender`; the worker finishes at
//! most the current dataset, flushes, and exits. Dropping the `Reader`
//! closes the output queue, which likewise unblocks and stops the worker.

mod header;
mod input;
mod output;
mod queue;

pub use header::HeaderSlot;
pub use input::{chunk_queue, ChunkQueue, ChunkSender, InputSource, ReadSource, SliceSource};
pub use output::OutputSink;
pub use queue::{buffer_queue, BufferReceiver, BufferSender, QueueClosed};

use std::sync::Arc;
use std::thread::JoinHandle;

use eyre::{eyre, Result, WrapErr};

use crate::buffer::{Buffer, GrowMode};
use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::o5m::O5mDecoder;
use crate::osm::{FileHeader, ReadTypes};

/// The wire formats a `Reader` can be constructed for. The format is an
/// explicit constructor argument; there is no global format registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// o5m data and o5c change streams (distinguished by the file type
    /// byte in the stream itself).
    O5m,
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Entity types to materialize; everything else is skipped in bulk.
    pub read_types: ReadTypes,
    /// Nominal capacity of each output buffer.
    pub buffer_capacity: usize,
    /// Growth behavior of the output buffers.
    pub grow_mode: GrowMode,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            read_types: ReadTypes::ALL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            grow_mode: GrowMode::Chain,
        }
    }
}

/// Consumer handle for a decoding worker. Buffers come back in wire
/// order; an empty buffer marks the end of the stream.
pub struct Reader {
    receiver: BufferReceiver,
    header: Arc<HeaderSlot>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl Reader {
    /// Spawn a decoding worker for `format` over `source`.
    pub fn new<S>(format: FileFormat, source: S, options: DecoderOptions) -> Result<Reader>
    where
        S: InputSource + 'static,
    {
        let FileFormat::O5m = format;
        let (sender, receiver) = buffer_queue();
        let header = Arc::new(HeaderSlot::new());
        let sink = OutputSink::new(sender, options.buffer_capacity, options.grow_mode);
        let decoder = O5mDecoder::new(source, sink, Arc::clone(&header), options.read_types);
        let worker = std::thread::Builder::new()
            .name("osmbuf-o5m-in".to_owned())
            .spawn(move || decoder.run())
            .wrap_err("failed to spawn decoder worker")?;
        Ok(Reader {
            receiver,
            header,
            worker: Some(worker),
        })
    }

    /// The file header. Blocks until the worker has it (which is at the
    /// latest when the first entity dataset is seen).
    pub fn header(&self) -> Result<FileHeader> {
        self.header.wait()
    }

    /// The next finished buffer, in wire order. An empty buffer means the
    /// stream has ended; decoder failures surface here as errors.
    pub fn read_buffer(&mut self) -> Result<Buffer> {
        self.receiver.recv()
    }

    /// Wait for the worker to finish and surface its result. Closes the
    /// output queue first, so a worker still producing is unblocked and
    /// winds down instead of deadlocking the join.
    pub fn close(self) -> Result<()> {
        let Reader {
            receiver,
            header: _,
            worker,
        } = self;
        drop(receiver);
        match worker {
            Some(worker) => worker
                .join()
                .map_err(|_| eyre!("decoder worker panicked"))?,
            None => Ok(()),
        }
    }
}
