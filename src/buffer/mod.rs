//! # Item Buffer
//!
//! A contiguous byte arena for self-describing OSM item records. Records
//! are appended through reserved spans (usually via the builders), become
//! visible to readers in record-sized atomic steps through `commit()`, and
//! are read back with zero-copy iteration.
//!
//! ## Cursor Model
//!
//! ```text
//! +-------------------------------+---------------------+--------------+
//! | finalized items               | record in progress  | free         |
//! | [0, committed)                | [committed, written)| [written, C) |
//! +-------------------------------+---------------------+--------------+
//! ```
//!
//! `committed` and `written` are always multiples of the 8-byte alignment
//! at every public API boundary; `committed <= written <= capacity` always
//! holds. The committed range parses as a sequence of aligned items whose
//! padded sizes sum exactly to `committed`.
//!
//! ## Memory Management
//!
//! - **Internally managed** (`Buffer::new`): the buffer owns its storage.
//!   `GrowMode` selects what happens when a reserve does not fit:
//!   `None` fails with `BufferError::Full`; `Realloc` doubles the storage
//!   (copying); `Chain` detaches the committed prefix into a chain of
//!   predecessor buffers and starts over in fresh storage of the original
//!   capacity, falling back to doubling when a single record outgrows the
//!   capacity on its own.
//! - **Externally managed** (`Buffer::from_bytes`): the buffer adopts
//!   caller-provided bytes and never grows; `into_bytes` hands the storage
//!   back. Growth attempts are `BufferError::Logic`.
//!
//! Chained predecessors are complete, committed buffers owned by their
//! successor; `detach_deepest()` removes them oldest-first so a consumer
//! can drain them in wire order.
//!
//! ## Builder Exclusion
//!
//! Builders borrow the buffer mutably for their whole scope, so the borrow
//! checker statically rules out commit/rollback/clear/iteration while any
//! builder is alive — the structural equivalent of the debug builder
//! counter in other implementations. `commit()` still verifies alignment
//! at runtime to catch builders abandoned without `close()`.

mod builder;
mod error;
mod iter;


pub use builder::{
    EntityBuilder, ItemBuilder, RelationMemberListBuilder, TagListBuilder, WayNodeListBuilder,
};
pub use error::BufferError;
pub use iter::{ItemIter, TypedItemIter};

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::{ALIGNMENT, MIN_BUFFER_CAPACITY};
use crate::items::{padded, ItemHeader, ItemView};
use crate::osm::ItemType;

/// What an internally managed buffer does when a reserve does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowMode {
    /// Fail with `BufferError::Full`.
    #[default]
    None,
    /// Double the storage, copying existing bytes. Offsets stay valid.
    Realloc,
    /// Detach the committed prefix into the chain and continue in fresh
    /// storage. Offsets into the chained predecessors stay valid; offsets
    /// into the grown segment shift down by the detached length.
    Chain,
}

#[derive(Debug, Default)]
pub struct Buffer {
    storage: Box<[u8]>,
    written: usize,
    committed: usize,
    mode: GrowMode,
    external: bool,
    chain: SmallVec<[Box<Buffer>; 2]>,
}

fn calculate_capacity(capacity: usize) -> usize {
    padded(capacity.max(MIN_BUFFER_CAPACITY))
}

impl Buffer {
    /// An empty, internally managed buffer. The capacity is rounded up to
    /// at least `MIN_BUFFER_CAPACITY` and to the alignment.
    pub fn new(capacity: usize, mode: GrowMode) -> Buffer {
        Buffer {
            storage: vec![0u8; calculate_capacity(capacity)].into_boxed_slice(),
            written: 0,
            committed: 0,
            mode,
            external: false,
            chain: SmallVec::new(),
        }
    }

    /// Adopt caller bytes as an externally managed, fully committed buffer.
    /// The length must be a multiple of the alignment.
    pub fn from_bytes(data: Vec<u8>) -> Result<Buffer> {
        let committed = data.len();
        Buffer::from_bytes_partial(data, committed)
    }

    /// Adopt caller bytes of which the first `committed` are finalized
    /// items; the rest of the storage is writable but the buffer will
    /// never grow.
    pub fn from_bytes_partial(data: Vec<u8>, committed: usize) -> Result<Buffer> {
        ensure!(
            data.len() % ALIGNMENT == 0,
            BufferError::InvalidArgument("buffer capacity must be a multiple of the alignment")
        );
        ensure!(
            committed % ALIGNMENT == 0,
            BufferError::InvalidArgument("committed must be a multiple of the alignment")
        );
        ensure!(
            committed <= data.len(),
            BufferError::InvalidArgument("committed cannot be larger than capacity")
        );
        Ok(Buffer {
            storage: data.into_boxed_slice(),
            written: committed,
            committed,
            mode: GrowMode::None,
            external: true,
            chain: SmallVec::new(),
        })
    }

    /// Give the backing storage back to the caller.
    pub fn into_bytes(self) -> Vec<u8> {
        self.storage.into_vec()
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn is_aligned(&self) -> bool {
        self.written % ALIGNMENT == 0 && self.committed % ALIGNMENT == 0
    }

    /// The finalized bytes, `[0, committed)`.
    pub fn data(&self) -> &[u8] {
        &self.storage[..self.committed]
    }

    /// Reserve `size` bytes at `written` and return the writable span.
    /// The span is only valid until the next reserve or growth.
    pub fn reserve_space(&mut self, size: usize) -> Result<&mut [u8]> {
        if self.written + size > self.capacity() {
            match self.mode {
                GrowMode::None => bail!(BufferError::Full),
                GrowMode::Realloc => {}
                GrowMode::Chain => {
                    if self.committed > 0 {
                        self.grow_chain();
                    }
                }
            }
            if self.written + size > self.capacity() {
                let mut new_capacity = self.capacity() * 2;
                while self.written + size > new_capacity {
                    new_capacity *= 2;
                }
                self.grow(new_capacity)?;
            }
        }
        let start = self.written;
        self.written += size;
        Ok(&mut self.storage[start..start + size])
    }

    /// Grow the storage to at least `size` bytes, copying existing content.
    /// Only internally managed buffers can grow.
    pub fn grow(&mut self, size: usize) -> Result<()> {
        ensure!(
            !self.external,
            BufferError::Logic("cannot grow an externally managed buffer")
        );
        let size = calculate_capacity(size);
        if size > self.capacity() {
            let mut storage = vec![0u8; size].into_boxed_slice();
            storage[..self.capacity()].copy_from_slice(&self.storage);
            self.storage = storage;
        }
        Ok(())
    }

    // Detach the committed prefix into a chained predecessor and re-home
    // the uncommitted tail at the start of fresh storage of the same
    // capacity. Relative offsets within the tail are preserved.
    fn grow_chain(&mut self) {
        let fresh = vec![0u8; self.capacity()].into_boxed_slice();
        let old_storage = std::mem::replace(&mut self.storage, fresh);
        let tail = self.written - self.committed;
        self.storage[..tail].copy_from_slice(&old_storage[self.committed..self.written]);
        self.chain.push(Box::new(Buffer {
            storage: old_storage,
            written: self.committed,
            committed: self.committed,
            mode: GrowMode::None,
            external: false,
            chain: SmallVec::new(),
        }));
        self.written = tail;
        self.committed = 0;
    }

    /// Mark the written bytes as committed. Returns the previous committed
    /// offset, which is where the record finalized by this call starts.
    pub fn commit(&mut self) -> Result<usize> {
        ensure!(
            self.written % ALIGNMENT == 0,
            BufferError::Logic("commit on a misaligned buffer (builder not closed?)")
        );
        let offset = self.committed;
        self.committed = self.written;
        Ok(offset)
    }

    /// Discard everything written since the last commit.
    pub fn rollback(&mut self) {
        self.written = self.committed;
    }

    /// Forget all content. Returns the number of committed bytes dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.committed;
        self.written = 0;
        self.committed = 0;
        dropped
    }

    /// Copy an item (padded) into a freshly reserved span. Returns the
    /// offset of the copy. Does not commit.
    pub fn add_item(&mut self, item: &ItemView<'_>) -> Result<usize> {
        let bytes = item.bytes();
        let padded_len = padded(bytes.len());
        let span = self.reserve_space(padded_len)?;
        span[..bytes.len()].copy_from_slice(bytes);
        span[bytes.len()..].fill(0);
        Ok(self.written - padded_len)
    }

    /// Bulk-copy the committed content of another buffer. Does not commit.
    pub fn add_buffer(&mut self, other: &Buffer) -> Result<()> {
        let span = self.reserve_space(other.committed())?;
        span.copy_from_slice(other.data());
        Ok(())
    }

    /// `add_item` followed by `commit`; returns the offset of the item.
    pub fn push_back(&mut self, item: &ItemView<'_>) -> Result<usize> {
        let offset = self.add_item(item)?;
        self.commit()?;
        Ok(offset)
    }

    /// Iterate all committed items.
    pub fn items(&self) -> ItemIter<'_> {
        ItemIter::over(self.data())
    }

    /// Iterate committed items with the given type tag.
    pub fn items_of(&self, kind: ItemType) -> TypedItemIter<'_> {
        TypedItemIter::new(self.items(), kind)
    }

    /// Iterate committed items starting from a known record offset.
    pub fn iter_from(&self, offset: usize) -> Result<ItemIter<'_>> {
        ensure!(
            offset % ALIGNMENT == 0,
            BufferError::InvalidArgument("item offset must be aligned")
        );
        ensure!(
            offset <= self.committed,
            BufferError::InvalidArgument("item offset beyond committed range")
        );
        Ok(ItemIter::starting_at(self.data(), offset))
    }

    /// The committed item starting at `offset`.
    pub fn get_item(&self, offset: usize) -> Result<ItemView<'_>> {
        match self.iter_from(offset)?.next() {
            Some(item) => Ok(item),
            None => bail!(BufferError::InvalidArgument("no item at offset")),
        }
    }

    /// True when chained predecessor buffers exist.
    pub fn has_chain(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Remove and return the oldest chained predecessor, transferring
    /// ownership to the caller. Predecessors come out in wire order.
    pub fn detach_deepest(&mut self) -> Option<Buffer> {
        if self.chain.is_empty() {
            None
        } else {
            Some(*self.chain.remove(0))
        }
    }

    /// Compact away all items with the removed flag, preserving the order
    /// of the survivors. Iterators and offsets are invalidated.
    pub fn purge_removed(&mut self) {
        self.purge_removed_with(|_, _| {});
    }

    /// Like `purge_removed`, invoking `moved` with `(old_offset,
    /// new_offset)` for every survivor that changes position so external
    /// indexes can be rewritten.
    pub fn purge_removed_with(&mut self, mut moved: impl FnMut(usize, usize)) {
        let mut read = 0;
        let mut write = 0;
        while read + ItemHeader::SIZE <= self.committed {
            let header = ItemHeader::from_bytes(&self.storage[read..]);
            let step = header.padded_size();
            if step < ItemHeader::SIZE || read + step > self.committed {
                break;
            }
            if !header.is_removed() {
                if read != write {
                    moved(read, write);
                    self.storage.copy_within(read..read + step, write);
                }
                write += step;
            }
            read += step;
        }
        self.written = write;
        self.committed = write;
    }

    // Write access for builders patching headers and fixed fields of the
    // in-progress record.

    pub(crate) fn patch(&mut self, pos: usize, bytes: &[u8]) {
        debug_assert!(pos + bytes.len() <= self.written);
        self.storage[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn patch_header_size(&mut self, pos: usize, size: u32) {
        self.patch(pos, &size.to_le_bytes());
    }

    pub(crate) fn patch_header_flags(&mut self, pos: usize, set: u8, clear: u8) {
        debug_assert!(pos + ItemHeader::SIZE <= self.written);
        let flags = self.storage[pos + 5];
        self.storage[pos + 5] = (flags & !clear) | set;
    }
}
