//! File-level metadata accumulated from a stream's prelude.
//!
//! The decoder fills a `FileHeader` while it walks the datasets that
//! precede the first entity (bounding boxes, file timestamp, the data/change
//! distinction) and hands it to the consumer before any entity record.

use hashbrown::HashMap;

use crate::osm::Location;

/// A rectangle in fixed-point coordinates, south-west and north-east corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub sw: Location,
    pub ne: Location,
}

#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    multiple_object_versions: bool,
    boxes: Vec<BoundingBox>,
    values: HashMap<String, String>,
}

impl FileHeader {
    pub fn new() -> FileHeader {
        FileHeader::default()
    }

    /// True for change streams (o5c), which may carry several versions of
    /// the same object.
    pub fn has_multiple_object_versions(&self) -> bool {
        self.multiple_object_versions
    }

    pub fn set_multiple_object_versions(&mut self, value: bool) {
        self.multiple_object_versions = value;
    }

    pub fn add_box(&mut self, bbox: BoundingBox) {
        self.boxes.push(bbox);
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// The first bounding box, if the stream declared one.
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.boxes.first()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}
