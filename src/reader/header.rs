//! One-shot hand-off of the file header from the decoder worker to the
//! consumer. The header must reach the consumer before any entity record
//! it gates; `wait()` blocks until the decoder marks the header done or
//! fails.

use eyre::{bail, Result};
use parking_lot::{Condvar, Mutex};

use crate::osm::FileHeader;

#[derive(Debug)]
enum SlotState {
    Pending,
    Ready(FileHeader),
    Failed(String),
}

#[derive(Debug)]
pub struct HeaderSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl HeaderSlot {
    pub fn new() -> HeaderSlot {
        HeaderSlot {
            state: Mutex::new(SlotState::Pending),
            cond: Condvar::new(),
        }
    }

    /// Publish the header. Only the first call takes effect.
    pub(crate) fn set(&self, header: FileHeader) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Ready(header);
            self.cond.notify_all();
        }
    }

    /// Mark the header as unobtainable; waiters get the message as an
    /// error.
    pub(crate) fn fail(&self, message: &str) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Failed(message.to_owned());
            self.cond.notify_all();
        }
    }

    pub fn wait(&self) -> Result<FileHeader> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Pending => self.cond.wait(&mut state),
                SlotState::Ready(header) => return Ok(header.clone()),
                SlotState::Failed(message) => bail!("file header unavailable: {}", message),
            }
        }
    }
}

impl Default for HeaderSlot {
    fn default() -> Self {
        HeaderSlot::new()
    }
}
