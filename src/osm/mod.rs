//! # OSM Entity Model Leaf Types
//!
//! The small value types shared by the buffer layer and the wire decoders:
//!
//! - `types`: the closed set of item type tags and the read-type bitmask
//! - `location`: fixed-point coordinates in 100-nanodegree units
//! - `timestamp`: seconds-since-epoch with ISO-8601 rendering
//! - `header`: file-level metadata (bounding boxes, key/value options,
//!   the multiple-object-versions flag)
//!
//! Everything here is `Copy` or cheaply `Clone`; none of it touches the
//! arena or the wire.

mod header;
mod location;
mod timestamp;
mod types;

pub use header::{BoundingBox, FileHeader};
pub use location::{Location, COORDINATE_PRECISION};
pub use timestamp::Timestamp;
pub use types::{ItemType, ReadTypes};
