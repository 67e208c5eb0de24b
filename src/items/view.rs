//! Zero-copy read access to items and entity payloads.
//!
//! Views borrow immutably from a byte slice, so any number of them can read
//! the same buffer concurrently once mutation has stopped.

use crate::buffer::ItemIter;
use crate::items::{ENTITY_FIXED_SIZE, NODE_FIXED_SIZE};
use crate::items::header::{flags, ItemHeader};
use crate::osm::{ItemType, Location, Timestamp};

/// An untyped view of one item: its header plus exactly `size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    bytes: &'a [u8],
}

impl<'a> ItemView<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> ItemView<'a> {
        debug_assert!(bytes.len() >= ItemHeader::SIZE);
        ItemView { bytes }
    }

    /// The item's raw bytes, header included, without trailing padding.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn header(&self) -> ItemHeader {
        ItemHeader::from_bytes(self.bytes)
    }

    pub fn kind(&self) -> ItemType {
        ItemType::from_u8(self.bytes[4])
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn padded_size(&self) -> usize {
        self.header().padded_size()
    }

    pub fn is_removed(&self) -> bool {
        self.bytes[5] & flags::REMOVED != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.bytes[5] & flags::HIDDEN != 0
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[ItemHeader::SIZE..]
    }

    pub fn as_node(&self) -> Option<NodeView<'a>> {
        if self.kind() == ItemType::Node && self.payload().len() >= NODE_FIXED_SIZE {
            Some(NodeView { item: *self })
        } else {
            None
        }
    }

    pub fn as_way(&self) -> Option<WayView<'a>> {
        if self.kind() == ItemType::Way && self.payload().len() >= ENTITY_FIXED_SIZE {
            Some(WayView { item: *self })
        } else {
            None
        }
    }

    pub fn as_relation(&self) -> Option<RelationView<'a>> {
        if self.kind() == ItemType::Relation && self.payload().len() >= ENTITY_FIXED_SIZE {
            Some(RelationView { item: *self })
        } else {
            None
        }
    }

    /// Dispatch on the entity kind, if this item is an entity.
    pub fn entity(&self) -> Option<Entity<'a>> {
        match self.kind() {
            ItemType::Node => self.as_node().map(Entity::Node),
            ItemType::Way => self.as_way().map(Entity::Way),
            ItemType::Relation => self.as_relation().map(Entity::Relation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Node(NodeView<'a>),
    Way(WayView<'a>),
    Relation(RelationView<'a>),
}

fn fixed_i64(payload: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(payload[offset..offset + 8].try_into().unwrap()) // INVARIANT: fixed block length checked at view construction
}

fn fixed_u32(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(payload[offset..offset + 4].try_into().unwrap()) // INVARIANT: fixed block length checked at view construction
}

fn fixed_i32(payload: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(payload[offset..offset + 4].try_into().unwrap()) // INVARIANT: fixed block length checked at view construction
}

/// Walk the sub-items that follow `fixed` bytes of payload and return the
/// first with the requested tag.
fn find_sub_item<'a>(item: &ItemView<'a>, fixed: usize, kind: ItemType) -> Option<ItemView<'a>> {
    ItemIter::over(&item.payload()[fixed..]).find(|sub| sub.kind() == kind)
}

macro_rules! entity_accessors {
    ($fixed:expr) => {
        pub fn id(&self) -> i64 {
            fixed_i64(self.item.payload(), 0)
        }

        pub fn changeset(&self) -> i64 {
            fixed_i64(self.item.payload(), 8)
        }

        pub fn timestamp(&self) -> Timestamp {
            Timestamp::new(fixed_i64(self.item.payload(), 16))
        }

        pub fn uid(&self) -> u32 {
            fixed_u32(self.item.payload(), 24)
        }

        pub fn version(&self) -> u32 {
            fixed_u32(self.item.payload(), 28)
        }

        pub fn visible(&self) -> bool {
            !self.item.is_hidden()
        }

        pub fn user(&self) -> Option<&'a str> {
            find_sub_item(&self.item, $fixed, ItemType::UserName)
                .and_then(|sub| std::str::from_utf8(sub.payload()).ok())
        }

        pub fn tags(&self) -> TagIter<'a> {
            let data = find_sub_item(&self.item, $fixed, ItemType::TagList)
                .map(|sub| sub.payload())
                .unwrap_or(&[]);
            TagIter { data }
        }

        pub fn item(&self) -> ItemView<'a> {
            self.item
        }
    };
}

#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    item: ItemView<'a>,
}

impl<'a> NodeView<'a> {
    entity_accessors!(NODE_FIXED_SIZE);

    pub fn location(&self) -> Location {
        Location::new(
            fixed_i32(self.item.payload(), 32),
            fixed_i32(self.item.payload(), 36),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WayView<'a> {
    item: ItemView<'a>,
}

impl<'a> WayView<'a> {
    entity_accessors!(ENTITY_FIXED_SIZE);

    pub fn node_refs(&self) -> WayNodeIter<'a> {
        let data = find_sub_item(&self.item, ENTITY_FIXED_SIZE, ItemType::WayNodeList)
            .map(|sub| sub.payload())
            .unwrap_or(&[]);
        WayNodeIter { data }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationView<'a> {
    item: ItemView<'a>,
}

impl<'a> RelationView<'a> {
    entity_accessors!(ENTITY_FIXED_SIZE);

    pub fn members(&self) -> MemberIter<'a> {
        let data = find_sub_item(&self.item, ENTITY_FIXED_SIZE, ItemType::RelationMemberList)
            .map(|sub| sub.payload())
            .unwrap_or(&[]);
        MemberIter { data }
    }
}

/// Iterates `key\0value\0` pairs in a tag list payload. Stops early on a
/// malformed pair (missing NUL or invalid UTF-8).
#[derive(Debug, Clone)]
pub struct TagIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for TagIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let key_end = self.data.iter().position(|&b| b == 0)?;
        let rest = &self.data[key_end + 1..];
        let value_end = rest.iter().position(|&b| b == 0)?;
        let key = std::str::from_utf8(&self.data[..key_end]).ok()?;
        let value = std::str::from_utf8(&rest[..value_end]).ok()?;
        self.data = &rest[value_end + 1..];
        Some((key, value))
    }
}

/// Iterates the `i64` node references in a way-node-list payload.
#[derive(Debug, Clone)]
pub struct WayNodeIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for WayNodeIter<'a> {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 8 {
            return None;
        }
        let id = i64::from_le_bytes(self.data[..8].try_into().unwrap()); // INVARIANT: length checked above
        self.data = &self.data[8..];
        Some(id)
    }
}

/// One member of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member<'a> {
    pub kind: ItemType,
    pub id: i64,
    pub role: &'a str,
}

/// Iterates packed member records: `id i64, kind u8, pad u8, role_len u16,
/// role bytes`.
#[derive(Debug, Clone)]
pub struct MemberIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for MemberIter<'a> {
    type Item = Member<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 12 {
            return None;
        }
        let id = i64::from_le_bytes(self.data[..8].try_into().unwrap()); // INVARIANT: length checked above
        let kind = ItemType::from_nwr_index(self.data[8] as usize);
        let role_len = u16::from_le_bytes([self.data[10], self.data[11]]) as usize;
        if self.data.len() < 12 + role_len {
            return None;
        }
        let role = std::str::from_utf8(&self.data[12..12 + role_len]).ok()?;
        self.data = &self.data[12 + role_len..];
        Some(Member { kind, id, role })
    }
}
