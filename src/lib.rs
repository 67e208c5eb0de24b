//! # osmbuf - OSM Item Buffers and o5m Stream Decoding
//!
//! osmbuf is the memory and wire core of an OpenStreetMap toolchain: a
//! contiguous, variable-length-record arena that stores heterogeneous,
//! self-describing OSM records without per-object allocations, and a
//! streaming decoder for the o5m/o5c formats that populates such arenas
//! incrementally. This implementation prioritizes:
//!
//! - **Zero-copy reads**: views and iterators borrow directly from the
//!   arena; nothing is materialized per object
//! - **Record-granular commits**: readers only ever see complete records
//! - **Single-threaded decoding, queue-based hand-off**: one worker per
//!   stream, ownership of each buffer transfers exactly once
//!
//! ## Quick Start
//!
//! ```ignore
//! use osmbuf::{DecoderOptions, Entity, FileFormat, Reader, ReadSource};
//!
//! let file = std::fs::File::open("extract.o5m")?;
//! let mut reader = Reader::new(
//!     FileFormat::O5m,
//!     ReadSource::new(file),
//!     DecoderOptions::default(),
//! )?;
//!
//! println!("bbox: {:?}", reader.header()?.bounding_box());
//! loop {
//!     let buffer = reader.read_buffer()?;
//!     if buffer.committed() == 0 {
//!         break; // end of stream
//!     }
//!     for item in buffer.items() {
//!         if let Some(Entity::Node(node)) = item.entity() {
//!             println!("node {} at {:?}", node.id(), node.location());
//!         }
//!     }
//! }
//! reader.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Reader (worker facade)          │
//! ├─────────────────────────────────────────┤
//! │   o5m decoder (varint/delta/ref-table)   │
//! ├─────────────────────────────────────────┤
//! │     Builders (scoped record writers)     │
//! ├─────────────────────────────────────────┤
//! │      Buffer (aligned item arena)         │
//! ├─────────────────────────────────────────┤
//! │   Items (headers + zero-copy views)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Data flow: raw byte chunks → input queue → o5m decoder → builders →
//! buffer → output queue → consumer iteration.
//!
//! ## Module Overview
//!
//! - [`buffer`]: the arena, its growth policies, iterators and builders
//! - [`items`]: record headers and zero-copy entity views
//! - [`o5m`]: the o5m/o5c wire decoder and its primitives
//! - [`osm`]: entity-model leaf types (type tags, locations, timestamps,
//!   file headers)
//! - [`reader`]: input sources, hand-off queues and the worker facade
//! - [`config`]: centralized constants

pub mod buffer;
pub mod config;
pub mod items;
pub mod o5m;
pub mod osm;
pub mod reader;

pub use buffer::{
    Buffer, BufferError, EntityBuilder, GrowMode, ItemBuilder, ItemIter,
    RelationMemberListBuilder, TagListBuilder, TypedItemIter, WayNodeListBuilder,
};
pub use items::{Entity, ItemHeader, ItemView, Member, NodeView, RelationView, WayView};
pub use o5m::{O5mDecoder, O5mError};
pub use osm::{BoundingBox, FileHeader, ItemType, Location, ReadTypes, Timestamp};
pub use reader::{
    chunk_queue, ChunkSender, DecoderOptions, FileFormat, InputSource, ReadSource, Reader,
    SliceSource,
};
