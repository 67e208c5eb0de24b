//! Cursors over adjacent length-prefixed items.
//!
//! An iterator carries the slice of committed bytes and a position;
//! advancing reads the header at the position and steps by its padded
//! size. Iteration is length-driven: sub-items nested inside an entity's
//! payload are covered by the entity's own size and are never visited at
//! the top level.

use crate::items::{ItemHeader, ItemView};
use crate::osm::ItemType;

#[derive(Debug, Clone)]
pub struct ItemIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ItemIter<'a> {
    /// Iterate the items laid out back to back in `data`. Used both for a
    /// buffer's committed range and for the sub-item region of an entity
    /// payload.
    pub fn over(data: &'a [u8]) -> ItemIter<'a> {
        ItemIter { data, pos: 0 }
    }

    pub(crate) fn starting_at(data: &'a [u8], pos: usize) -> ItemIter<'a> {
        ItemIter { data, pos }
    }

    /// Byte offset of the next item to be yielded.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = ItemView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + ItemHeader::SIZE > self.data.len() {
            return None;
        }
        let header = ItemHeader::from_bytes(&self.data[self.pos..]);
        let size = header.size as usize;
        // A size below the header size means corrupt bytes; stop rather
        // than loop forever.
        if size < ItemHeader::SIZE || self.pos + header.padded_size() > self.data.len() {
            return None;
        }
        let view = ItemView::new(&self.data[self.pos..self.pos + size]);
        self.pos += header.padded_size();
        Some(view)
    }
}

/// An `ItemIter` that only yields items with the requested type tag.
#[derive(Debug, Clone)]
pub struct TypedItemIter<'a> {
    inner: ItemIter<'a>,
    kind: ItemType,
}

impl<'a> TypedItemIter<'a> {
    pub(crate) fn new(inner: ItemIter<'a>, kind: ItemType) -> TypedItemIter<'a> {
        TypedItemIter { inner, kind }
    }
}

impl<'a> Iterator for TypedItemIter<'a> {
    type Item = ItemView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find(|item| item.kind() == self.kind)
    }
}
