//! # Item Type Tags
//!
//! Every record stored in a buffer carries one of these tags in its header.
//! The discriminants are part of the buffer's binary layout and must not be
//! reordered.
//!
//! | Category | Tags |
//! |----------|------|
//! | **Entities** | Node, Way, Relation, Changeset |
//! | **Geometry** | Area, OuterRing, InnerRing |
//! | **Sub-items** | TagList, WayNodeList, RelationMemberList, UserName |
//!
//! Geometry tags and Changeset exist so that buffers produced by other
//! parts of a toolchain can be stored and iterated; the o5m decoder never
//! emits them.

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Undefined = 0x00,
    Node = 0x01,
    Way = 0x02,
    Relation = 0x03,
    Area = 0x04,
    Changeset = 0x05,
    TagList = 0x11,
    WayNodeList = 0x12,
    RelationMemberList = 0x13,
    UserName = 0x21,
    OuterRing = 0x40,
    InnerRing = 0x41,
}

impl ItemType {
    pub fn from_u8(raw: u8) -> ItemType {
        match raw {
            0x01 => ItemType::Node,
            0x02 => ItemType::Way,
            0x03 => ItemType::Relation,
            0x04 => ItemType::Area,
            0x05 => ItemType::Changeset,
            0x11 => ItemType::TagList,
            0x12 => ItemType::WayNodeList,
            0x13 => ItemType::RelationMemberList,
            0x21 => ItemType::UserName,
            0x40 => ItemType::OuterRing,
            0x41 => ItemType::InnerRing,
            _ => ItemType::Undefined,
        }
    }

    /// True for the top-level OSM entity tags.
    pub fn is_entity(self) -> bool {
        matches!(
            self,
            ItemType::Node | ItemType::Way | ItemType::Relation | ItemType::Changeset
        )
    }

    /// Node/way/relation index (0/1/2) used by the wire format for member
    /// types and the per-type delta decoders.
    pub fn nwr_index(self) -> Option<usize> {
        match self {
            ItemType::Node => Some(0),
            ItemType::Way => Some(1),
            ItemType::Relation => Some(2),
            _ => None,
        }
    }

    pub fn from_nwr_index(index: usize) -> ItemType {
        match index {
            0 => ItemType::Node,
            1 => ItemType::Way,
            2 => ItemType::Relation,
            _ => ItemType::Undefined,
        }
    }
}

/// Bitmask selecting which entity types a decoder materializes. Records of
/// unselected types are skipped in bulk without touching the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTypes(u8);

impl ReadTypes {
    pub const NOTHING: ReadTypes = ReadTypes(0);
    pub const NODES: ReadTypes = ReadTypes(0b0001);
    pub const WAYS: ReadTypes = ReadTypes(0b0010);
    pub const RELATIONS: ReadTypes = ReadTypes(0b0100);
    pub const CHANGESETS: ReadTypes = ReadTypes(0b1000);
    pub const ALL: ReadTypes = ReadTypes(0b1111);

    pub const fn union(self, other: ReadTypes) -> ReadTypes {
        ReadTypes(self.0 | other.0)
    }

    pub fn contains(self, other: ReadTypes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn nodes(self) -> bool {
        self.contains(ReadTypes::NODES)
    }

    pub fn ways(self) -> bool {
        self.contains(ReadTypes::WAYS)
    }

    pub fn relations(self) -> bool {
        self.contains(ReadTypes::RELATIONS)
    }

    pub fn changesets(self) -> bool {
        self.contains(ReadTypes::CHANGESETS)
    }
}

impl Default for ReadTypes {
    fn default() -> Self {
        ReadTypes::ALL
    }
}

impl std::ops::BitOr for ReadTypes {
    type Output = ReadTypes;

    fn bitor(self, rhs: ReadTypes) -> ReadTypes {
        self.union(rhs)
    }
}
