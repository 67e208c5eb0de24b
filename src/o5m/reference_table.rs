//! # String Reference Table
//!
//! A ring of recently seen strings, used to resolve back-references in the
//! o5m stream. The dimensions (15000 slots of 256 bytes, strings up to 252
//! bytes) come from the format description.
//!
//! The backing memory is materialized lazily on the first `add`, so an
//! idle parser stays cheap to construct and to move between workers.
//! `clear` only rewinds the cursor; stale slot content is unreachable
//! through well-formed back-references.

use eyre::{bail, Result};

use crate::config::{MAX_REFERENCE_STRING, REFERENCE_ENTRY_SIZE, REFERENCE_TABLE_ENTRIES};
use crate::o5m::O5mError;

#[derive(Debug, Default)]
pub struct ReferenceTable {
    table: Vec<u8>,
    current: usize,
}

impl ReferenceTable {
    pub fn new() -> ReferenceTable {
        ReferenceTable::default()
    }

    pub fn clear(&mut self) {
        self.current = 0;
    }

    /// Store `bytes` in the next slot. Strings longer than the slot budget
    /// are silently skipped; the cursor does not advance for them.
    pub fn add(&mut self, bytes: &[u8]) {
        if self.table.is_empty() {
            self.table = vec![0; REFERENCE_TABLE_ENTRIES * REFERENCE_ENTRY_SIZE];
        }
        if bytes.len() <= MAX_REFERENCE_STRING {
            let start = self.current * REFERENCE_ENTRY_SIZE;
            self.table[start..start + bytes.len()].copy_from_slice(bytes);
            self.current = (self.current + 1) % REFERENCE_TABLE_ENTRIES;
        }
    }

    /// The slot written `index` adds ago (1 = most recent). Fails for
    /// index 0, indexes beyond the table, and before the table was ever
    /// written. Returns the full slot; callers parse up to their NUL
    /// terminators.
    pub fn get(&self, index: u64) -> Result<&[u8]> {
        if self.table.is_empty() || index == 0 || index > REFERENCE_TABLE_ENTRIES as u64 {
            bail!(O5mError::new("reference to non-existing string in table"));
        }
        let entry =
            (self.current + REFERENCE_TABLE_ENTRIES - index as usize) % REFERENCE_TABLE_ENTRIES;
        let start = entry * REFERENCE_ENTRY_SIZE;
        Ok(&self.table[start..start + REFERENCE_ENTRY_SIZE])
    }
}
