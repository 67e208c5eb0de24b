//! Fuzz testing for the buffer builders and iteration.
//!
//! Builds arbitrary record sequences, interleaved with commits, rollbacks
//! and purges, and checks that the committed range always iterates cleanly
//! and stays aligned.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use osmbuf::{Buffer, EntityBuilder, GrowMode, ItemBuilder, ItemType, Location};

#[derive(Debug, Arbitrary)]
enum Operation {
    Node {
        id: i64,
        lon: i32,
        lat: i32,
        tags: Vec<(String, String)>,
        user: Option<String>,
    },
    Way {
        id: i64,
        refs: Vec<i64>,
    },
    Relation {
        id: i64,
        members: Vec<(u8, i64, String)>,
    },
    Raw {
        payload: Vec<u8>,
        removed: bool,
    },
    Rollback,
    Purge,
}

#[derive(Debug, Arbitrary)]
struct BuilderInput {
    chain: bool,
    operations: Vec<Operation>,
}

fuzz_target!(|input: BuilderInput| {
    let mode = if input.chain {
        GrowMode::Chain
    } else {
        GrowMode::Realloc
    };
    let mut buffer = Buffer::new(256, mode);

    for op in input.operations {
        match op {
            Operation::Node {
                id,
                lon,
                lat,
                tags,
                user,
            } => {
                let mut node = EntityBuilder::node(&mut buffer).unwrap();
                node.set_id(id);
                node.set_location(Location::new(lon, lat));
                if let Some(user) = user {
                    node.add_user(&user).unwrap();
                }
                if !tags.is_empty() {
                    let mut list = node.tags().unwrap();
                    for (key, value) in &tags {
                        list.add_tag(key, value).unwrap();
                    }
                    list.close().unwrap();
                }
                node.close().unwrap();
                buffer.commit().unwrap();
            }
            Operation::Way { id, refs } => {
                let mut way = EntityBuilder::way(&mut buffer).unwrap();
                way.set_id(id);
                let mut list = way.way_nodes().unwrap();
                for node_ref in refs {
                    list.add_node_ref(node_ref).unwrap();
                }
                list.close().unwrap();
                way.close().unwrap();
                buffer.commit().unwrap();
            }
            Operation::Relation { id, members } => {
                let mut relation = EntityBuilder::relation(&mut buffer).unwrap();
                relation.set_id(id);
                let mut list = relation.members().unwrap();
                for (kind, member_id, role) in &members {
                    let kind = ItemType::from_nwr_index(usize::from(kind % 3));
                    if role.len() <= u16::MAX as usize {
                        list.add_member(kind, *member_id, role.as_bytes()).unwrap();
                    }
                }
                list.close().unwrap();
                relation.close().unwrap();
                buffer.commit().unwrap();
            }
            Operation::Raw { payload, removed } => {
                let mut item = ItemBuilder::new(&mut buffer, ItemType::Changeset).unwrap();
                item.add_bytes(&payload).unwrap();
                item.set_removed(removed);
                item.close().unwrap();
                buffer.commit().unwrap();
            }
            Operation::Rollback => {
                buffer.reserve_space(24).unwrap();
                buffer.rollback();
            }
            Operation::Purge => {
                buffer.purge_removed();
            }
        }

        assert!(buffer.is_aligned());
        let mut total = 0;
        for item in buffer.items() {
            total += item.padded_size();
        }
        assert_eq!(total, buffer.committed());
    }
});
