#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use rar_headers::{HeaderDecoder, HeaderResult, Signature};

fuzz_target!(|data: &[u8]| {
    // First byte picks where the input is cut; the rest arrives on demand.
    let Some((&cut, data)) = data.split_first() else {
        return;
    };
    let cut = usize::from(cut).min(data.len());
    let mut bytes = Signature::RAR50.to_vec();
    bytes.extend_from_slice(&data[..cut]);

    let Ok(mut decoder) = HeaderDecoder::new(Cursor::new(bytes)) else {
        return;
    };
    let mut fed = false;
    loop {
        match decoder.read_next() {
            Ok(HeaderResult::Record(record)) => {
                assert!(record.next_block_pos > record.current_block_pos);
            }
            Ok(HeaderResult::NeedMoreBytes { .. }) | Ok(HeaderResult::Eof { .. }) if !fed => {
                decoder.source_mut().get_mut().extend_from_slice(&data[cut..]);
                fed = true;
            }
            _ => break,
        }
    }
});
