//! # Configuration Constants
//!
//! This module centralizes the crate's tuning constants, grouping
//! interdependent values together so they cannot drift apart. Constants that
//! depend on each other are co-located and tied down with compile-time
//! assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! ALIGNMENT (8 bytes)
//!       │
//!       ├─> MIN_BUFFER_CAPACITY (must be a multiple; the smallest arena
//!       │     that can hold one node record)
//!       │
//!       ├─> DEFAULT_BUFFER_CAPACITY (must be a multiple; the nominal size
//!       │     of each decoder output buffer)
//!       │
//!       └─> ItemHeader::SIZE (equal to ALIGNMENT so that a header never
//!             straddles an alignment boundary)
//!
//! DEFAULT_BUFFER_CAPACITY (1 MiB)
//!       │
//!       └─> BUFFER_FILL_PERCENT (high-water mark; once `committed` crosses
//!             this fraction the buffer is handed to the output queue and a
//!             fresh one of the same nominal capacity takes its place)
//!
//! REFERENCE_TABLE_ENTRIES (15000) ── from the o5m format description
//! REFERENCE_ENTRY_SIZE (256)      ── from the o5m format description
//!       │
//!       └─> MAX_REFERENCE_STRING (252: entry size minus slack for the
//!             terminating NUL bytes; longer strings are never entered)
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `ALIGNMENT` is a power of two (padding arithmetic uses bit masks)
//! 2. `MIN_BUFFER_CAPACITY % ALIGNMENT == 0`
//! 3. `DEFAULT_BUFFER_CAPACITY % ALIGNMENT == 0`
//! 4. `MAX_REFERENCE_STRING + 4 <= REFERENCE_ENTRY_SIZE`
//! 5. `0 < BUFFER_FILL_PERCENT < 100`

/// Alignment of every item stored in a buffer. All committed offsets and
/// all padded item sizes are multiples of this.
pub const ALIGNMENT: usize = 8;

/// Smallest capacity an internally managed buffer will be created with.
/// The majority of node records fit into this size.
pub const MIN_BUFFER_CAPACITY: usize = 64;

/// Nominal capacity of each buffer the decoder emits.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Percentage of the nominal capacity at which the decoder's current output
/// buffer is considered full enough to hand off.
pub const BUFFER_FILL_PERCENT: usize = 80;

/// Number of slots in the o5m string reference table.
pub const REFERENCE_TABLE_ENTRIES: usize = 15000;

/// Width of one reference table slot in bytes.
pub const REFERENCE_ENTRY_SIZE: usize = 256;

/// Longest string (including its NUL separators) that is entered into the
/// reference table. Longer strings are silently skipped.
pub const MAX_REFERENCE_STRING: usize = 252;

/// Maximum number of bytes a base-128 varint may occupy.
pub const MAX_VARINT_LENGTH: usize = 10;

/// Bound on the number of pending chunks in the input queue before the
/// producer blocks.
pub const CHUNK_QUEUE_CAPACITY: usize = 16;

/// Bound on the number of decoded buffers in flight before the decoder
/// blocks on the consumer.
pub const BUFFER_QUEUE_CAPACITY: usize = 8;

/// Chunk size pulled per read by the `std::io::Read` input adapter.
pub const READ_SOURCE_CHUNK: usize = 64 * 1024;

const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(MIN_BUFFER_CAPACITY % ALIGNMENT == 0);
const _: () = assert!(DEFAULT_BUFFER_CAPACITY % ALIGNMENT == 0);
const _: () = assert!(MAX_REFERENCE_STRING + 4 <= REFERENCE_ENTRY_SIZE);
const _: () = assert!(BUFFER_FILL_PERCENT > 0 && BUFFER_FILL_PERCENT < 100);
