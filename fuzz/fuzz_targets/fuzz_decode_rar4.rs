#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use rar_headers::{HeaderDecoder, HeaderResult, Signature};

fuzz_target!(|data: &[u8]| {
    // Header stream behind a valid signature
    let mut bytes = Signature::RAR15.to_vec();
    bytes.extend_from_slice(data);

    let Ok(mut decoder) = HeaderDecoder::new(Cursor::new(bytes)) else {
        return;
    };
    let mut last = 0;
    while let Ok(HeaderResult::Record(record)) = decoder.read_next() {
        assert!(record.current_block_pos >= last);
        assert!(record.next_block_pos > record.current_block_pos);
        last = record.next_block_pos;
    }
});
