//! RAR 1.5-4.x header codec.
//!
//! Every header starts with the same 7 bytes:
//! - u16: CRC-32 of the rest of the header, low 16 bits
//! - u8: header type
//! - u16: flags
//! - u16: header size, these 7 bytes included
//!
//! Type-specific fixed fields follow, all little-endian.

pub mod archive_header;
pub mod aux_header;
pub mod file_header;
pub mod name;
pub mod terminator_header;

pub use archive_header::ArchiveHeaderParser;
pub use aux_header::AuxHeaderParser;
pub use file_header::FileHeaderParser;
pub use terminator_header::TerminatorHeaderParser;

use super::{HeaderLoader, ParsedHeader, MIN_HEADER_SIZE};
use crate::checksum::{ChecksumAccumulator, ChecksumKind};
use crate::cursor::ByteCursor;
use crate::error::{Result, Violation};
use crate::file_media::ByteSource;
use crate::record::{AuxKind, Header, HeaderKind, RawHeaderPrefix};

/// Size of the common prefix.
pub const PREFIX_SIZE: usize = 7;
/// Main header and inline comment header: prefix plus 6 bytes.
pub const SHORT_HEADER_SIZE: usize = 13;

/// Salt stored in front of each encrypted header.
pub const SALT_SIZE: usize = 8;

pub const SKIP_IF_UNKNOWN: u16 = 0x4000;
pub const LONG_BLOCK: u16 = 0x8000;

/// Decode the common 7-byte prefix.
pub fn parse_prefix(bytes: &[u8]) -> Result<RawHeaderPrefix> {
    let mut cursor = ByteCursor::over_record(bytes);
    let checksum = cursor.read_u16()?;
    let header_type = cursor.read_u8()?;
    let flags = cursor.read_u16()?;
    let size = cursor.read_u16()?;

    if u64::from(size) < MIN_HEADER_SIZE {
        return Err(Violation::HeaderTooSmall {
            size: u64::from(size),
            minimum: MIN_HEADER_SIZE,
        }
        .into());
    }

    Ok(RawHeaderPrefix {
        checksum: u32::from(checksum),
        header_type: u64::from(header_type),
        flags: u64::from(flags),
        declared_size: u64::from(size),
        skip_if_unknown: flags & SKIP_IF_UNKNOWN != 0,
    })
}

/// Read and decode one header through `loader`.
pub fn decode<S: ByteSource>(loader: &mut HeaderLoader<'_, S>) -> Result<ParsedHeader> {
    let prefix = parse_prefix(loader.fill(PREFIX_SIZE)?)?;
    let flags = prefix.flags as u16;
    let kind = HeaderKind::from_legacy(prefix.header_type as u8);
    let size = prefix.declared_size as usize;

    // Inline comments are decoded separately, so only the fixed span of
    // these headers is read here.
    let inline_comment = kind == HeaderKind::Auxiliary(AuxKind::Comment)
        || (kind == HeaderKind::Main && flags & archive_header::MHD_COMMENT != 0);
    let read_len = if inline_comment {
        size.min(SHORT_HEADER_SIZE)
    } else {
        size
    };

    let bytes = &loader.fill(read_len)?[..read_len];
    let mut body = ByteCursor::over_record(bytes);
    body.seek_to(PREFIX_SIZE as u64);

    let (header, payload_size) = match kind {
        HeaderKind::Main => (Header::Main(ArchiveHeaderParser::parse(&mut body, flags)?), 0),
        HeaderKind::Entry(entry_kind) => {
            let entry = FileHeaderParser::parse(&mut body, entry_kind, flags, size)?;
            let packed = entry.packed_size;
            (Header::Entry(entry), packed)
        }
        HeaderKind::EndOfArchive => (
            Header::EndOfArchive(TerminatorHeaderParser::parse(&mut body, flags)?),
            0,
        ),
        other => {
            let aux = match other {
                HeaderKind::Auxiliary(aux) => aux,
                _ => AuxKind::Unknown(prefix.header_type),
            };
            let (aux, payload) = AuxHeaderParser::parse(&mut body, aux, flags)?;
            (Header::Auxiliary(aux), payload)
        }
    };

    // A file comment stored in the header is not covered by the checksum.
    let hashed_len = match &header {
        Header::Entry(entry) if entry.flags.has_comment => body.tell() as usize,
        _ => read_len,
    };
    let computed = ChecksumAccumulator::of_header(ChecksumKind::Legacy16, &bytes[..hashed_len]);
    let unchecked = matches!(
        kind,
        HeaderKind::Auxiliary(AuxKind::Signature | AuxKind::AuthenticityVerification)
    );

    Ok(ParsedHeader {
        checksum_ok: unchecked || computed == prefix.checksum,
        prefix,
        header,
        header_size: prefix.declared_size,
        payload_size,
    })
}
