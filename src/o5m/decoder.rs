//! # o5m Dataset State Machine
//!
//! The decoder pulls byte chunks from an [`InputSource`], re-splices them
//! into a sliding window, walks the dataset stream and materializes entity
//! records through builders into the output sink's current buffer. Each
//! committed record is followed by a rotation check that hands finished
//! buffers to the consumer queue.
//!
//! ```text
//! INIT ──decode_header──▶ READY
//! READY ──dataset byte──▶ {NODE, WAY, REL, BBOX, TS, CTRL, UNKNOWN}
//! *     on 0xff Reset ──▶ clears refs + all deltas, back to READY
//! NODE/WAY/REL ──commit──▶ READY (header marked done on first entity)
//! input exhausted ──▶ DONE (flush current buffer + sentinel)
//! ```
//!
//! The wire format is not self-resynchronizing: any failure is fatal to
//! this decoder instance. Records committed before the failure remain
//! valid and observable by the consumer.

use std::sync::Arc;

use eyre::{bail, ensure, Result};

use crate::buffer::{Buffer, EntityBuilder};
use crate::config::MAX_VARINT_LENGTH;
use crate::o5m::varint::{decode_varint, decode_zvarint};
use crate::o5m::{DeltaDecoder, O5mError, ReferenceTable};
use crate::osm::{BoundingBox, FileHeader, ItemType, Location, ReadTypes, Timestamp};
use crate::reader::{HeaderSlot, InputSource, OutputSink, QueueClosed};

/// Dataset type bytes of the o5m wire format.
pub mod dataset {
    pub const NODE: u8 = 0x10;
    pub const WAY: u8 = 0x11;
    pub const RELATION: u8 = 0x12;
    pub const BOUNDING_BOX: u8 = 0xdb;
    pub const TIMESTAMP: u8 = 0xdc;
    pub const HEADER: u8 = 0xe0;
    pub const SYNC: u8 = 0xee;
    pub const JUMP: u8 = 0xef;
    pub const RESET: u8 = 0xff;
}

const HEADER_MAGIC: [u8; 5] = [0xff, 0xe0, 0x04, b'o', b'5'];

fn member_type_index(c: u8) -> Result<usize> {
    if !(b'0'..=b'2').contains(&c) {
        bail!(O5mError::new("unknown member type"));
    }
    Ok((c - b'0') as usize)
}

// String decoding helpers. A string is either inline (first byte 0x00,
// then the raw NUL-terminated content, which also enters the reference
// table) or a varint back-reference resolved against the table. The
// returned slices borrow from the table or the input, whichever held the
// content; `'d: 't` lets both unify on the table borrow.

fn decode_user<'t, 'd: 't>(
    refs: &'t mut ReferenceTable,
    data: &mut &'d [u8],
) -> Result<(u32, &'t [u8])> {
    if data[0] == 0 {
        *data = &data[1..];
        if data.is_empty() {
            bail!(O5mError::new("string format error"));
        }
        let start = *data;
        let mut cur = start;
        let uid = decode_varint(&mut cur)?;
        ensure!(uid <= u64::from(u32::MAX), O5mError::new("uid out of range"));
        if cur.is_empty() {
            bail!(O5mError::new("missing user name"));
        }
        cur = &cur[1..];
        if uid == 0 {
            // Anonymous user: the two separator bytes enter the table.
            refs.add(b"\0\0");
            *data = cur;
            return Ok((0, &[]));
        }
        let name_end = match cur.iter().position(|&b| b == 0) {
            Some(end) => end,
            None => bail!(O5mError::new("no null byte in user name")),
        };
        let consumed = (start.len() - cur.len()) + name_end + 1;
        refs.add(&start[..consumed]);
        let name = &cur[..name_end];
        *data = &start[consumed..];
        Ok((uid as u32, name))
    } else {
        let index = decode_varint(data)?;
        let slot = refs.get(index)?;
        let mut cur = slot;
        let uid = decode_varint(&mut cur)?;
        ensure!(uid <= u64::from(u32::MAX), O5mError::new("uid out of range"));
        if cur.is_empty() {
            bail!(O5mError::new("missing user name"));
        }
        cur = &cur[1..];
        if uid == 0 {
            return Ok((0, &[]));
        }
        let name_end = match cur.iter().position(|&b| b == 0) {
            Some(end) => end,
            None => bail!(O5mError::new("no null byte in user name")),
        };
        Ok((uid as u32, &cur[..name_end]))
    }
}

fn decode_role<'t, 'd: 't>(
    refs: &'t mut ReferenceTable,
    data: &mut &'d [u8],
) -> Result<(usize, &'t [u8])> {
    if data[0] == 0 {
        *data = &data[1..];
        if data.is_empty() {
            bail!(O5mError::new("string format error"));
        }
        let start = *data;
        let index = member_type_index(start[0])?;
        let rest = &start[1..];
        if rest.is_empty() {
            bail!(O5mError::new("missing role"));
        }
        let role_end = match rest.iter().position(|&b| b == 0) {
            Some(end) => end,
            None => bail!(O5mError::new("no null byte in role")),
        };
        let consumed = 1 + role_end + 1;
        refs.add(&start[..consumed]);
        let role = &rest[..role_end];
        *data = &start[consumed..];
        Ok((index, role))
    } else {
        let table_index = decode_varint(data)?;
        let slot = refs.get(table_index)?;
        let index = member_type_index(slot[0])?;
        let rest = &slot[1..];
        let role_end = match rest.iter().position(|&b| b == 0) {
            Some(end) => end,
            None => bail!(O5mError::new("no null byte in role")),
        };
        Ok((index, &rest[..role_end]))
    }
}

fn decode_tags(
    refs: &mut ReferenceTable,
    data: &mut &[u8],
    entity: &mut EntityBuilder<'_>,
) -> Result<()> {
    let mut tags = entity.tags()?;
    while !data.is_empty() {
        if data[0] == 0 {
            let rest = &data[1..];
            if rest.is_empty() {
                bail!(O5mError::new("string format error"));
            }
            let key_end = match rest.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => bail!(O5mError::new("no null byte in tag key")),
            };
            let after_key = &rest[key_end + 1..];
            let value_end = match after_key.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => bail!(O5mError::new("no null byte in tag value")),
            };
            let total = key_end + 1 + value_end + 1;
            refs.add(&rest[..total]);
            tags.add_tag_bytes(&rest[..key_end], &after_key[..value_end])?;
            *data = &rest[total..];
        } else {
            let index = decode_varint(data)?;
            let slot = refs.get(index)?;
            let key_end = match slot.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => bail!(O5mError::new("no null byte in tag key")),
            };
            let after_key = &slot[key_end + 1..];
            let value_end = match after_key.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => bail!(O5mError::new("no null byte in tag value")),
            };
            tags.add_tag_bytes(&slot[..key_end], &after_key[..value_end])?;
        }
    }
    tags.close()
}

/// The mutable wire state shared by all entity datasets: the reference
/// table and the six delta streams (plus the member-type-indexed trio).
#[derive(Debug, Default)]
struct EntityState {
    refs: ReferenceTable,
    delta_id: DeltaDecoder,
    delta_timestamp: DeltaDecoder,
    delta_changeset: DeltaDecoder,
    delta_lon: DeltaDecoder,
    delta_lat: DeltaDecoder,
    delta_way_node_id: DeltaDecoder,
    delta_member_ids: [DeltaDecoder; 3],
}

impl EntityState {
    fn reset(&mut self) {
        self.refs.clear();
        self.delta_id.clear();
        self.delta_timestamp.clear();
        self.delta_changeset.clear();
        self.delta_lon.clear();
        self.delta_lat.clear();
        self.delta_way_node_id.clear();
        for delta in &mut self.delta_member_ids {
            delta.clear();
        }
    }

    // Version/timestamp/changeset/user block. A leading 0x00 means the
    // object carries no metadata at all; a zero post-delta timestamp means
    // it carries a version only.
    fn decode_info(&mut self, data: &mut &[u8], entity: &mut EntityBuilder<'_>) -> Result<()> {
        if data.is_empty() {
            bail!(O5mError::new(
                "premature end of file while parsing object metadata"
            ));
        }
        if data[0] == 0 {
            *data = &data[1..];
            return Ok(());
        }
        let version = decode_varint(data)?;
        ensure!(
            version <= u64::from(u32::MAX),
            O5mError::new("object version too large")
        );
        entity.set_version(version as u32);
        let timestamp = self.delta_timestamp.update(decode_zvarint(data)?);
        if timestamp != 0 {
            entity.set_timestamp(Timestamp::new(timestamp));
            entity.set_changeset(self.delta_changeset.update(decode_zvarint(data)?));
            if !data.is_empty() {
                let (uid, name) = decode_user(&mut self.refs, data)?;
                entity.set_uid(uid);
                entity.add_user_bytes(name)?;
            }
        }
        Ok(())
    }

    fn decode_node(&mut self, mut data: &[u8], buffer: &mut Buffer) -> Result<()> {
        let mut entity = EntityBuilder::node(buffer)?;
        entity.set_id(self.delta_id.update(decode_zvarint(&mut data)?));
        self.decode_info(&mut data, &mut entity)?;
        if data.is_empty() {
            // No location: the object is deleted.
            entity.set_visible(false);
        } else {
            let lon = self.delta_lon.update(decode_zvarint(&mut data)?);
            let lat = self.delta_lat.update(decode_zvarint(&mut data)?);
            entity.set_location(Location::from_wire(lon, lat));
            if !data.is_empty() {
                decode_tags(&mut self.refs, &mut data, &mut entity)?;
            }
        }
        entity.close()
    }

    fn decode_way(&mut self, mut data: &[u8], buffer: &mut Buffer) -> Result<()> {
        let mut entity = EntityBuilder::way(buffer)?;
        entity.set_id(self.delta_id.update(decode_zvarint(&mut data)?));
        self.decode_info(&mut data, &mut entity)?;
        if data.is_empty() {
            entity.set_visible(false);
        } else {
            let ref_len = decode_varint(&mut data)? as usize;
            if ref_len > 0 {
                ensure!(
                    ref_len <= data.len(),
                    O5mError::new("way nodes ref section too long")
                );
                let (mut refs_data, rest) = data.split_at(ref_len);
                data = rest;
                let mut nodes = entity.way_nodes()?;
                while !refs_data.is_empty() {
                    nodes.add_node_ref(
                        self.delta_way_node_id
                            .update(decode_zvarint(&mut refs_data)?),
                    )?;
                }
                nodes.close()?;
            }
            if !data.is_empty() {
                decode_tags(&mut self.refs, &mut data, &mut entity)?;
            }
        }
        entity.close()
    }

    fn decode_relation(&mut self, mut data: &[u8], buffer: &mut Buffer) -> Result<()> {
        let mut entity = EntityBuilder::relation(buffer)?;
        entity.set_id(self.delta_id.update(decode_zvarint(&mut data)?));
        self.decode_info(&mut data, &mut entity)?;
        if data.is_empty() {
            entity.set_visible(false);
        } else {
            let ref_len = decode_varint(&mut data)? as usize;
            if ref_len > 0 {
                ensure!(
                    ref_len <= data.len(),
                    O5mError::new("relation format error")
                );
                let (mut member_data, rest) = data.split_at(ref_len);
                data = rest;
                let mut members = entity.members()?;
                while !member_data.is_empty() {
                    let delta = decode_zvarint(&mut member_data)?;
                    if member_data.is_empty() {
                        bail!(O5mError::new("relation member format error"));
                    }
                    let (index, role) = decode_role(&mut self.refs, &mut member_data)?;
                    // The delta applies to the decoder of the member's own
                    // type, not the global id stream.
                    let member_ref = self.delta_member_ids[index].update(delta);
                    members.add_member(ItemType::from_nwr_index(index), member_ref, role)?;
                }
                members.close()?;
            }
            if !data.is_empty() {
                decode_tags(&mut self.refs, &mut data, &mut entity)?;
            }
        }
        entity.close()
    }
}

/// Streaming o5m/o5c decoder. One instance runs on one worker; it owns its
/// input source and hands finished buffers to the consumer through the
/// output sink.
pub struct O5mDecoder<S: InputSource> {
    source: S,
    input: Vec<u8>,
    pos: usize,
    state: EntityState,
    header: FileHeader,
    header_done: bool,
    header_slot: Arc<HeaderSlot>,
    out: OutputSink,
    read_types: ReadTypes,
}

impl<S: InputSource> O5mDecoder<S> {
    pub fn new(
        source: S,
        out: OutputSink,
        header_slot: Arc<HeaderSlot>,
        read_types: ReadTypes,
    ) -> O5mDecoder<S> {
        O5mDecoder {
            source,
            input: Vec::new(),
            pos: 0,
            state: EntityState::default(),
            header: FileHeader::new(),
            header_done: false,
            header_slot,
            out,
            read_types,
        }
    }

    /// Decode the whole stream. On success the consumer has received every
    /// buffer and the end-of-stream sentinel; on failure it has received
    /// the error in their place. The returned error mirrors what was sent
    /// to the consumer (cancellation through a dropped consumer is not an
    /// error).
    pub fn run(mut self) -> Result<()> {
        if let Err(err) = self.decode() {
            if err.downcast_ref::<QueueClosed>().is_some() {
                return Ok(());
            }
            let message = err.to_string();
            self.header_slot.fail(&message);
            self.out.fail(err);
            bail!("o5m decoding failed: {}", message);
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<()> {
        self.decode_header()?;
        self.decode_data()
    }

    // Slide unconsumed bytes to the front of the window and pull chunks
    // until `need` bytes are buffered or the input ends.
    fn ensure_bytes_available(&mut self, need: usize) -> bool {
        if self.input.len() - self.pos >= need {
            return true;
        }
        if self.source.input_done() {
            return false;
        }
        self.input.drain(..self.pos);
        self.pos = 0;
        while self.input.len() < need {
            let chunk = self.source.get_input();
            if chunk.is_empty() {
                if self.source.input_done() {
                    return false;
                }
                continue;
            }
            self.input.extend_from_slice(&chunk);
        }
        true
    }

    fn decode_header(&mut self) -> Result<()> {
        if !self.ensure_bytes_available(7) {
            bail!(O5mError::new("file too short (incomplete header info)"));
        }
        let window = &self.input[self.pos..];
        ensure!(
            window[..5] == HEADER_MAGIC,
            O5mError::new("wrong header magic")
        );
        match window[5] {
            b'm' => self.header.set_multiple_object_versions(false),
            b'c' => self.header.set_multiple_object_versions(true),
            _ => bail!(O5mError::new("wrong header magic")),
        }
        ensure!(window[6] == b'2', O5mError::new("wrong header magic"));
        self.pos += 7;
        Ok(())
    }

    fn mark_header_done(&mut self) {
        if !self.header_done {
            self.header_done = true;
            self.header_slot.set(self.header.clone());
        }
    }

    fn decode_data(&mut self) -> Result<()> {
        while self.ensure_bytes_available(1) {
            let ds_type = self.input[self.pos];
            self.pos += 1;
            if ds_type > dataset::JUMP {
                // Bare control bytes carry no length; only Reset acts.
                if ds_type == dataset::RESET {
                    self.state.reset();
                }
                continue;
            }

            self.ensure_bytes_available(MAX_VARINT_LENGTH);
            let mut rest = &self.input[self.pos..];
            let available = rest.len();
            let length = decode_varint(&mut rest)? as usize;
            self.pos += available - rest.len();
            if !self.ensure_bytes_available(length) {
                bail!(O5mError::new("premature end of file"));
            }

            match ds_type {
                dataset::NODE => {
                    self.mark_header_done();
                    if self.read_types.nodes() {
                        let payload = &self.input[self.pos..self.pos + length];
                        self.state.decode_node(payload, self.out.buffer_mut())?;
                        self.out.buffer_mut().commit()?;
                        self.out.maybe_rotate()?;
                    }
                }
                dataset::WAY => {
                    self.mark_header_done();
                    if self.read_types.ways() {
                        let payload = &self.input[self.pos..self.pos + length];
                        self.state.decode_way(payload, self.out.buffer_mut())?;
                        self.out.buffer_mut().commit()?;
                        self.out.maybe_rotate()?;
                    }
                }
                dataset::RELATION => {
                    self.mark_header_done();
                    if self.read_types.relations() {
                        let payload = &self.input[self.pos..self.pos + length];
                        self.state.decode_relation(payload, self.out.buffer_mut())?;
                        self.out.buffer_mut().commit()?;
                        self.out.maybe_rotate()?;
                    }
                }
                dataset::BOUNDING_BOX => {
                    Self::decode_bbox(
                        &self.input[self.pos..self.pos + length],
                        &mut self.header,
                    )?;
                }
                dataset::TIMESTAMP => {
                    Self::decode_timestamp(
                        &self.input[self.pos..self.pos + length],
                        &mut self.header,
                    )?;
                }
                // Header marker, sync, jump and unknown datasets are
                // skipped over their declared length.
                _ => {}
            }

            if self.read_types.is_empty() && self.header_done {
                break;
            }
            self.pos += length;
        }

        self.mark_header_done();
        self.out.finish()
    }

    fn decode_bbox(mut data: &[u8], header: &mut FileHeader) -> Result<()> {
        let sw_lon = decode_zvarint(&mut data)?;
        let sw_lat = decode_zvarint(&mut data)?;
        let ne_lon = decode_zvarint(&mut data)?;
        let ne_lat = decode_zvarint(&mut data)?;
        header.add_box(BoundingBox {
            sw: Location::from_wire(sw_lon, sw_lat),
            ne: Location::from_wire(ne_lon, ne_lat),
        });
        Ok(())
    }

    fn decode_timestamp(mut data: &[u8], header: &mut FileHeader) -> Result<()> {
        let iso = Timestamp::new(decode_zvarint(&mut data)?).to_iso();
        header.set("o5m_timestamp", iso.as_str());
        header.set("timestamp", iso);
        Ok(())
    }
}
