//! # Self-Describing Item Records
//!
//! Every record in a buffer is a length-prefixed, self-describing item: an
//! 8-byte header carrying the exact size, a type tag and flags, followed by
//! the payload. Entity records (node/way/relation) nest further items
//! inside their payload — the user name, the tag list, the node-ref or
//! member list — each again a complete item.
//!
//! ## Binary Layout
//!
//! ```text
//! +-----------+---------+---------+----------+----------------------+
//! | size      | kind    | flags   | reserved | payload              |
//! | (u32 LE)  | (u8)    | (u8)    | (2 bytes)| [u8; size - 8]       |
//! +-----------+---------+---------+----------+----------------------+
//! ```
//!
//! `size` is the exact byte count of header plus payload. Items are stored
//! back to back at 8-byte alignment; iteration steps by `padded_size()`,
//! the size rounded up to the alignment, so the padded sizes of the items
//! in a buffer sum exactly to its committed length.
//!
//! ## Zero-Copy Design
//!
//! Headers and payload fields are read with explicit little-endian byte
//! manipulation rather than `#[repr(C, packed)]` casts, so views work on
//! any byte slice regardless of its actual address alignment. All getters
//! in `view` return values or slices borrowed from the underlying buffer;
//! nothing here allocates.
//!
//! ## Module Structure
//!
//! - `header`: the 8-byte item header and its flag bits
//! - `view`: typed read-only views (`ItemView`, `NodeView`, `WayView`,
//!   `RelationView`) and the payload iterators (tags, node refs, members)

mod header;
mod view;

pub use header::{flags, padded, ItemHeader};
pub use view::{
    Entity, ItemView, Member, MemberIter, NodeView, RelationView, TagIter, WayNodeIter, WayView,
};

/// Byte length of the fixed field block shared by all entity payloads.
pub const ENTITY_FIXED_SIZE: usize = 32;

/// Byte length of a node's fixed field block (common block plus location).
pub const NODE_FIXED_SIZE: usize = 40;

const _: () = assert!(ENTITY_FIXED_SIZE % crate::config::ALIGNMENT == 0);
const _: () = assert!(NODE_FIXED_SIZE % crate::config::ALIGNMENT == 0);
