//! RAR 1.5-4.x file name decoding.
//!
//! With the unicode flag set, a name is either plain UTF-8 or a single-byte
//! name followed by NUL and a compact UTF-16 encoding that refers back to
//! the single-byte name for runs of unchanged characters.

use crate::record::{EntryName, NameEncoding};

const MAX_NAME_CHARS: usize = 0x10000;

/// Decode stored name bytes.
pub fn decode_name(raw: &[u8], unicode: bool) -> EntryName {
    let (encoding, text) = if !unicode {
        (NameEncoding::SingleByte, raw.iter().map(|&b| char::from(b)).collect())
    } else if let Some(nul) = raw.iter().position(|&b| b == 0) {
        let wide = decode_dual(&raw[..nul], &raw[nul + 1..]);
        let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        (NameEncoding::DualEncoded, String::from_utf16_lossy(&wide[..end]))
    } else {
        (NameEncoding::Utf8, String::from_utf8_lossy(raw).into_owned())
    };

    EntryName {
        raw: raw.to_vec(),
        encoding,
        text,
    }
}

/// Expand the UTF-16 half of a dual-encoded name.
///
/// The encoding starts with a high byte shared by case 1 characters, then
/// flag bytes whose 2-bit groups (most significant first) pick how the next
/// character is stored.
fn decode_dual(name: &[u8], enc: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(name.len());
    let mut pos = 0;
    let high = match enc.first() {
        Some(&b) => {
            pos = 1;
            u16::from(b) << 8
        }
        None => 0,
    };
    let mut flags = 0u8;
    let mut flag_bits = 0;

    while pos < enc.len() && out.len() < MAX_NAME_CHARS {
        if flag_bits == 0 {
            flags = enc[pos];
            pos += 1;
            flag_bits = 8;
        }
        match flags >> 6 {
            0 => {
                if let Some(&b) = enc.get(pos) {
                    out.push(u16::from(b));
                    pos += 1;
                }
            }
            1 => {
                if let Some(&b) = enc.get(pos) {
                    out.push(u16::from(b) + high);
                    pos += 1;
                }
            }
            2 => {
                if pos + 1 < enc.len() {
                    out.push(u16::from_le_bytes([enc[pos], enc[pos + 1]]));
                    pos += 2;
                }
            }
            _ => {
                if let Some(&len) = enc.get(pos) {
                    pos += 1;
                    if len & 0x80 != 0 {
                        if let Some(&correction) = enc.get(pos) {
                            pos += 1;
                            for _ in 0..(usize::from(len & 0x7f) + 2) {
                                let Some(&b) = name.get(out.len()) else { break };
                                out.push(u16::from(b.wrapping_add(correction)) + high);
                            }
                        }
                    } else {
                        for _ in 0..(usize::from(len) + 2) {
                            let Some(&b) = name.get(out.len()) else { break };
                            out.push(u16::from(b));
                        }
                    }
                }
            }
        }
        flags <<= 2;
        flag_bits -= 2;
    }
    out
}
