//! # Output Sink
//!
//! Owns the decoder's current output buffer and decides when buffers are
//! handed to the consumer queue. After every committed record the decoder
//! calls `maybe_rotate`, which first drains chained predecessor buffers
//! (deepest first, preserving wire order) and then swaps the current
//! buffer out once its committed content crosses the high-water mark. At
//! the end of the stream `finish` pushes whatever is left plus the empty
//! end-of-stream sentinel.

use eyre::Result;

use crate::buffer::{Buffer, GrowMode};
use crate::config::BUFFER_FILL_PERCENT;
use crate::reader::queue::BufferSender;

pub struct OutputSink {
    queue: BufferSender,
    buffer: Buffer,
    nominal_capacity: usize,
    grow_mode: GrowMode,
    high_water: usize,
}

impl OutputSink {
    pub fn new(queue: BufferSender, capacity: usize, grow_mode: GrowMode) -> OutputSink {
        let buffer = Buffer::new(capacity, grow_mode);
        let nominal_capacity = buffer.capacity();
        OutputSink {
            queue,
            buffer,
            nominal_capacity,
            grow_mode,
            high_water: nominal_capacity * BUFFER_FILL_PERCENT / 100,
        }
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Hand finished storage to the consumer: chained predecessors first,
    /// then the current buffer if it has crossed the high-water mark.
    pub fn maybe_rotate(&mut self) -> Result<()> {
        while let Some(predecessor) = self.buffer.detach_deepest() {
            self.queue.send(Ok(predecessor))?;
        }
        if self.buffer.committed() > self.high_water {
            let full = std::mem::replace(
                &mut self.buffer,
                Buffer::new(self.nominal_capacity, self.grow_mode),
            );
            self.queue.send(Ok(full))?;
        }
        Ok(())
    }

    /// Flush everything and emit the end-of-stream sentinel.
    pub fn finish(&mut self) -> Result<()> {
        while let Some(predecessor) = self.buffer.detach_deepest() {
            self.queue.send(Ok(predecessor))?;
        }
        let last = std::mem::take(&mut self.buffer);
        if last.committed() > 0 {
            self.queue.send(Ok(last))?;
        }
        self.queue.send(Ok(Buffer::default()))?;
        Ok(())
    }

    /// Report a terminal decoder failure to the consumer.
    pub fn fail(&mut self, err: eyre::Report) {
        let _ = self.queue.send(Err(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ItemBuilder;
    use crate::osm::ItemType;
    use crate::reader::queue::buffer_queue;

    fn commit_marker(buffer: &mut Buffer, marker: u8) {
        let mut item = ItemBuilder::new(buffer, ItemType::Changeset).unwrap();
        item.add_bytes(&[marker]).unwrap();
        item.close().unwrap();
        buffer.commit().unwrap();
    }

    #[test]
    fn rotation_waits_for_the_high_water_mark() {
        let (sender, receiver) = buffer_queue();
        let mut sink = OutputSink::new(sender, 64, GrowMode::Realloc);
        commit_marker(sink.buffer_mut(), 1);
        sink.maybe_rotate().unwrap();
        // 16 of 64 bytes committed: nothing rotates yet.
        commit_marker(sink.buffer_mut(), 2);
        commit_marker(sink.buffer_mut(), 3);
        commit_marker(sink.buffer_mut(), 4);
        // 64 of 64: past the 80% mark.
        sink.maybe_rotate().unwrap();
        sink.finish().unwrap();

        let first = receiver.recv().unwrap();
        assert_eq!(first.items().count(), 4);
        let sentinel = receiver.recv().unwrap();
        assert_eq!(sentinel.committed(), 0);
    }

    #[test]
    fn chained_predecessors_flush_in_wire_order() {
        let (sender, receiver) = buffer_queue();
        let mut sink = OutputSink::new(sender, 64, GrowMode::Chain);
        for marker in 0..12u8 {
            commit_marker(sink.buffer_mut(), marker);
        }
        sink.finish().unwrap();

        let mut markers = Vec::new();
        loop {
            let buffer = receiver.recv().unwrap();
            if buffer.committed() == 0 {
                break;
            }
            for item in buffer.items() {
                markers.push(item.payload()[0]);
            }
        }
        assert_eq!(markers, (0..12u8).collect::<Vec<_>>());
    }
}
