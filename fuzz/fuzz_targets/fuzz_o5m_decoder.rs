//! Fuzz testing for the o5m decoder.
//!
//! Feeds arbitrary byte sequences through the full reader pipeline under
//! varying chunk sizes and buffer configurations to ensure malformed input
//! is always rejected with an error instead of a panic or a hang.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use osmbuf::{DecoderOptions, FileFormat, GrowMode, ReadTypes, Reader, SliceSource};

#[derive(Debug, Arbitrary)]
struct DecoderInput {
    data: Vec<u8>,
    chunk_size: u8,
    small_buffers: bool,
    chain: bool,
    read_mask: u8,
}

fuzz_target!(|input: DecoderInput| {
    let chunk_size = usize::from(input.chunk_size).max(1);
    let options = DecoderOptions {
        read_types: match input.read_mask % 4 {
            0 => ReadTypes::ALL,
            1 => ReadTypes::NODES,
            2 => ReadTypes::WAYS | ReadTypes::RELATIONS,
            _ => ReadTypes::NOTHING,
        },
        buffer_capacity: if input.small_buffers { 64 } else { 4096 },
        grow_mode: if input.chain {
            GrowMode::Chain
        } else {
            GrowMode::Realloc
        },
    };

    let source = SliceSource::new(&input.data, chunk_size);
    let Ok(mut reader) = Reader::new(FileFormat::O5m, source, options) else {
        return;
    };
    loop {
        match reader.read_buffer() {
            Ok(buffer) if buffer.committed() == 0 => break,
            Ok(buffer) => {
                // Whatever decoded must iterate cleanly.
                for item in buffer.items() {
                    let _ = item.entity();
                }
            }
            Err(_) => break,
        }
    }
    let _ = reader.close();
});
