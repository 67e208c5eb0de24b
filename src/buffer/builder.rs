//! # Scoped Record Builders
//!
//! A builder reserves space for an item's header when it opens, lets the
//! caller fill in fields and nested sub-records, and patches the header's
//! size on close to cover everything reserved during its lifetime. Closing
//! also pads `written` to the alignment so the next item starts aligned;
//! the padding is counted by enclosing records, never by the item that was
//! just closed.
//!
//! `close()` is the strict path and reports a full buffer while padding;
//! `Drop` is the fallback that still patches the size (and pads when room
//! remains) on early exits, so an abandoned builder never leaves an
//! unpatched header behind. After a failed build the caller's remedy is
//! `Buffer::rollback()`, which discards the partial record and restores
//! alignment unconditionally.
//!
//! Nesting is strict by construction: a list builder mutably reborrows its
//! parent, so the parent cannot be touched (nor the buffer committed)
//! until the child goes out of scope.

use eyre::{ensure, Result};

use crate::buffer::{Buffer, BufferError};
use crate::config::ALIGNMENT;
use crate::items::{ItemHeader, ENTITY_FIXED_SIZE, NODE_FIXED_SIZE};
use crate::osm::{ItemType, Location, Timestamp};

// Offsets are kept relative to `committed` so they survive chain growth,
// which moves the uncommitted tail to the start of fresh storage.

fn open_item(buffer: &mut Buffer, kind: ItemType) -> Result<usize> {
    debug_assert!(buffer.written() % ALIGNMENT == 0);
    let rel = buffer.written() - buffer.committed();
    let span = buffer.reserve_space(ItemHeader::SIZE)?;
    ItemHeader::new(kind).write_to(span);
    Ok(rel)
}

fn patch_size(buffer: &mut Buffer, rel: usize) {
    let pos = buffer.committed() + rel;
    let size = (buffer.written() - pos) as u32;
    buffer.patch_header_size(pos, size);
}

fn pad_to_alignment(buffer: &mut Buffer) -> Result<()> {
    let rem = buffer.written() % ALIGNMENT;
    if rem != 0 {
        let span = buffer.reserve_space(ALIGNMENT - rem)?;
        span.fill(0);
    }
    Ok(())
}

/// Writer for a plain item: a header followed by raw payload bytes.
pub struct ItemBuilder<'a> {
    buffer: &'a mut Buffer,
    rel: usize,
    closed: bool,
}

impl<'a> ItemBuilder<'a> {
    pub fn new(buffer: &'a mut Buffer, kind: ItemType) -> Result<ItemBuilder<'a>> {
        let rel = open_item(buffer, kind)?;
        Ok(ItemBuilder {
            buffer,
            rel,
            closed: false,
        })
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let span = self.buffer.reserve_space(bytes.len())?;
        span.copy_from_slice(bytes);
        Ok(())
    }

    pub fn set_removed(&mut self, removed: bool) {
        let pos = self.buffer.committed() + self.rel;
        if removed {
            self.buffer
                .patch_header_flags(pos, crate::items::flags::REMOVED, 0);
        } else {
            self.buffer
                .patch_header_flags(pos, 0, crate::items::flags::REMOVED);
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        patch_size(self.buffer, self.rel);
        pad_to_alignment(self.buffer)
    }

    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for ItemBuilder<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Writer for a node, way or relation record: header, fixed field block,
/// then optional sub-items (user name, tag list, reference lists).
pub struct EntityBuilder<'a> {
    buffer: &'a mut Buffer,
    rel: usize,
    kind: ItemType,
    closed: bool,
}

impl<'a> EntityBuilder<'a> {
    pub fn node(buffer: &'a mut Buffer) -> Result<EntityBuilder<'a>> {
        Self::open(buffer, ItemType::Node, NODE_FIXED_SIZE)
    }

    pub fn way(buffer: &'a mut Buffer) -> Result<EntityBuilder<'a>> {
        Self::open(buffer, ItemType::Way, ENTITY_FIXED_SIZE)
    }

    pub fn relation(buffer: &'a mut Buffer) -> Result<EntityBuilder<'a>> {
        Self::open(buffer, ItemType::Relation, ENTITY_FIXED_SIZE)
    }

    fn open(buffer: &'a mut Buffer, kind: ItemType, fixed: usize) -> Result<EntityBuilder<'a>> {
        let rel = open_item(buffer, kind)?;
        let span = buffer.reserve_space(fixed)?;
        span.fill(0);
        if kind == ItemType::Node {
            span[32..36].copy_from_slice(&i32::MIN.to_le_bytes());
            span[36..40].copy_from_slice(&i32::MIN.to_le_bytes());
        }
        Ok(EntityBuilder {
            buffer,
            rel,
            kind,
            closed: false,
        })
    }

    fn field_pos(&self, offset: usize) -> usize {
        self.buffer.committed() + self.rel + ItemHeader::SIZE + offset
    }

    pub fn set_id(&mut self, id: i64) {
        let pos = self.field_pos(0);
        self.buffer.patch(pos, &id.to_le_bytes());
    }

    pub fn set_changeset(&mut self, changeset: i64) {
        let pos = self.field_pos(8);
        self.buffer.patch(pos, &changeset.to_le_bytes());
    }

    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        let pos = self.field_pos(16);
        self.buffer.patch(pos, &timestamp.seconds().to_le_bytes());
    }

    pub fn set_uid(&mut self, uid: u32) {
        let pos = self.field_pos(24);
        self.buffer.patch(pos, &uid.to_le_bytes());
    }

    pub fn set_version(&mut self, version: u32) {
        let pos = self.field_pos(28);
        self.buffer.patch(pos, &version.to_le_bytes());
    }

    pub fn set_location(&mut self, location: Location) {
        debug_assert_eq!(self.kind, ItemType::Node);
        let pos = self.field_pos(32);
        self.buffer.patch(pos, &location.x().to_le_bytes());
        let pos = self.field_pos(36);
        self.buffer.patch(pos, &location.y().to_le_bytes());
    }

    pub fn set_visible(&mut self, visible: bool) {
        let pos = self.buffer.committed() + self.rel;
        if visible {
            self.buffer
                .patch_header_flags(pos, 0, crate::items::flags::HIDDEN);
        } else {
            self.buffer
                .patch_header_flags(pos, crate::items::flags::HIDDEN, 0);
        }
    }

    pub fn add_user(&mut self, name: &str) -> Result<()> {
        self.add_user_bytes(name.as_bytes())
    }

    /// Write the user name as a `UserName` sub-item.
    pub fn add_user_bytes(&mut self, name: &[u8]) -> Result<()> {
        let rel = open_item(self.buffer, ItemType::UserName)?;
        let span = self.buffer.reserve_space(name.len())?;
        span.copy_from_slice(name);
        patch_size(self.buffer, rel);
        pad_to_alignment(self.buffer)
    }

    pub fn tags(&mut self) -> Result<TagListBuilder<'_>> {
        TagListBuilder::new(self.buffer)
    }

    pub fn way_nodes(&mut self) -> Result<WayNodeListBuilder<'_>> {
        debug_assert_eq!(self.kind, ItemType::Way);
        WayNodeListBuilder::new(self.buffer)
    }

    pub fn members(&mut self) -> Result<RelationMemberListBuilder<'_>> {
        debug_assert_eq!(self.kind, ItemType::Relation);
        RelationMemberListBuilder::new(self.buffer)
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        patch_size(self.buffer, self.rel);
        pad_to_alignment(self.buffer)
    }

    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for EntityBuilder<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Writer for a `TagList` sub-item: packed `key\0value\0` pairs.
pub struct TagListBuilder<'a> {
    buffer: &'a mut Buffer,
    rel: usize,
    closed: bool,
}

impl<'a> TagListBuilder<'a> {
    fn new(buffer: &'a mut Buffer) -> Result<TagListBuilder<'a>> {
        let rel = open_item(buffer, ItemType::TagList)?;
        Ok(TagListBuilder {
            buffer,
            rel,
            closed: false,
        })
    }

    pub fn add_tag(&mut self, key: &str, value: &str) -> Result<()> {
        self.add_tag_bytes(key.as_bytes(), value.as_bytes())
    }

    pub fn add_tag_bytes(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let total = key.len() + value.len() + 2;
        let span = self.buffer.reserve_space(total)?;
        span[..key.len()].copy_from_slice(key);
        span[key.len()] = 0;
        span[key.len() + 1..total - 1].copy_from_slice(value);
        span[total - 1] = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        patch_size(self.buffer, self.rel);
        pad_to_alignment(self.buffer)
    }

    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for TagListBuilder<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Writer for a `WayNodeList` sub-item: packed `i64` node references.
pub struct WayNodeListBuilder<'a> {
    buffer: &'a mut Buffer,
    rel: usize,
    closed: bool,
}

impl<'a> WayNodeListBuilder<'a> {
    fn new(buffer: &'a mut Buffer) -> Result<WayNodeListBuilder<'a>> {
        let rel = open_item(buffer, ItemType::WayNodeList)?;
        Ok(WayNodeListBuilder {
            buffer,
            rel,
            closed: false,
        })
    }

    pub fn add_node_ref(&mut self, id: i64) -> Result<()> {
        let span = self.buffer.reserve_space(8)?;
        span.copy_from_slice(&id.to_le_bytes());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        patch_size(self.buffer, self.rel);
        pad_to_alignment(self.buffer)
    }

    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for WayNodeListBuilder<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Writer for a `RelationMemberList` sub-item.
pub struct RelationMemberListBuilder<'a> {
    buffer: &'a mut Buffer,
    rel: usize,
    closed: bool,
}

impl<'a> RelationMemberListBuilder<'a> {
    fn new(buffer: &'a mut Buffer) -> Result<RelationMemberListBuilder<'a>> {
        let rel = open_item(buffer, ItemType::RelationMemberList)?;
        Ok(RelationMemberListBuilder {
            buffer,
            rel,
            closed: false,
        })
    }

    pub fn add_member(&mut self, kind: ItemType, id: i64, role: &[u8]) -> Result<()> {
        let index = match kind.nwr_index() {
            Some(index) => index,
            None => {
                eyre::bail!(BufferError::InvalidArgument(
                    "member type must be node, way or relation"
                ))
            }
        };
        ensure!(
            role.len() <= u16::MAX as usize,
            BufferError::InvalidArgument("member role too long")
        );
        let total = 12 + role.len();
        let span = self.buffer.reserve_space(total)?;
        span[..8].copy_from_slice(&id.to_le_bytes());
        span[8] = index as u8;
        span[9] = 0;
        span[10..12].copy_from_slice(&(role.len() as u16).to_le_bytes());
        span[12..].copy_from_slice(role);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        patch_size(self.buffer, self.rel);
        pad_to_alignment(self.buffer)
    }

    pub fn close(mut self) -> Result<()> {
        self.finish()
    }
}

impl Drop for RelationMemberListBuilder<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
