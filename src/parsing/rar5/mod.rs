//! RAR5 format parsing modules.
//!
//! RAR5 uses a completely different header format than RAR4:
//! - Variable-length integers (vint) for sizes
//! - CRC-32 instead of CRC-16
//! - Different header type codes
//! - An extensible extra area at the end of each header
//!
//! Common layout:
//! - u32: CRC-32 of everything after it
//! - vint: size of everything after this field (1-3 bytes, so at most 2 MB)
//! - vint: header type
//! - vint: header flags
//! - vint: extra area size, if flags & 0x0001
//! - vint: data size, if flags & 0x0002
//! - type-specific fields
//! - extra area

pub mod archive_header;
pub mod encryption_header;
pub mod end_header;
pub mod extra;
pub mod file_header;
pub mod vint;

pub use archive_header::Rar5ArchiveHeaderParser;
pub use encryption_header::Rar5EncryptionHeaderParser;
pub use end_header::Rar5EndHeaderParser;
pub use extra::{ExtraFieldSink, ExtraFieldTable};
pub use file_header::Rar5FileHeaderParser;
pub use vint::{read_vint, read_vint_bounded, VintError};

use super::{HeaderLoader, ParsedHeader, MIN_HEADER_SIZE};
use crate::checksum::{ChecksumAccumulator, ChecksumKind};
use crate::cursor::ByteCursor;
use crate::error::{Result, Violation};
use crate::file_media::ByteSource;
use crate::record::{AuxHeader, Header, HeaderKind, RawHeaderPrefix};

/// Bytes read before the header size is known: CRC plus the longest size
/// field.
pub const FIRST_READ_SIZE: usize = 7;
/// Longest accepted header size field.
pub const MAX_SIZE_FIELD_LEN: usize = 3;
/// IV stored in front of each encrypted header.
pub const IV_SIZE: usize = 16;

/// RAR5 common header flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rar5HeaderFlags {
    /// Extra area is present after header
    pub has_extra_area: bool,
    /// Data area is present after header
    pub has_data_area: bool,
    /// Skip header if unknown type
    pub skip_if_unknown: bool,
    /// Data continues from previous volume
    pub split_before: bool,
    /// Data continues in next volume
    pub split_after: bool,
    /// Service header belongs to the preceding file header
    pub is_child: bool,
    /// Service header is inherited by later file headers
    pub is_inherited: bool,
}

impl From<u64> for Rar5HeaderFlags {
    fn from(flags: u64) -> Self {
        Self {
            has_extra_area: flags & 0x0001 != 0,
            has_data_area: flags & 0x0002 != 0,
            skip_if_unknown: flags & 0x0004 != 0,
            split_before: flags & 0x0008 != 0,
            split_after: flags & 0x0010 != 0,
            is_child: flags & 0x0020 != 0,
            is_inherited: flags & 0x0040 != 0,
        }
    }
}

/// Read and decode one header through `loader`. `block_pos` is the
/// absolute position of the record, needed for locator offsets.
pub fn decode<S: ByteSource>(loader: &mut HeaderLoader<'_, S>, block_pos: u64) -> Result<ParsedHeader> {
    let first = loader.fill(FIRST_READ_SIZE)?;
    let checksum = u32::from_le_bytes([first[0], first[1], first[2], first[3]]);
    let (size, size_len) = read_vint_bounded(&first[4..FIRST_READ_SIZE], MAX_SIZE_FIELD_LEN)
        .map_err(|_| Violation::HeaderTooLarge)?;

    let header_size = 4 + size_len as u64 + size;
    if header_size < MIN_HEADER_SIZE {
        return Err(Violation::HeaderTooSmall {
            size: header_size,
            minimum: MIN_HEADER_SIZE,
        }
        .into());
    }
    let len = header_size as usize;
    let bytes = &loader.fill(len)?[..len];

    let checksum_ok = ChecksumAccumulator::of_header(ChecksumKind::Crc32, bytes) == checksum;

    let mut cursor = ByteCursor::over_record(bytes);
    cursor.seek_to(4 + size_len as u64);
    let header_type = cursor.read_varint()?;
    let raw_flags = cursor.read_varint()?;
    let flags = Rar5HeaderFlags::from(raw_flags);

    let extra_size = if flags.has_extra_area {
        cursor.read_varint()?
    } else {
        0
    };
    let data_size = if flags.has_data_area {
        cursor.read_varint()?
    } else {
        0
    };
    if extra_size >= header_size || cursor.tell() > header_size - extra_size {
        return Err(Violation::ExtraAreaTooLarge {
            extra_size,
            header_size,
        }
        .into());
    }

    let fields_end = len - extra_size as usize;
    let extra = ExtraFieldTable::new(&bytes[fields_end..]);
    let mut fields = ByteCursor::over_record(&bytes[..fields_end]);
    fields.seek_to(cursor.tell());

    let header = match HeaderKind::from_modern(header_type) {
        HeaderKind::Main => Header::Main(Rar5ArchiveHeaderParser::parse(&mut fields, &extra, block_pos)?),
        HeaderKind::Entry(kind) => Header::Entry(Rar5FileHeaderParser::parse(
            &mut fields,
            &extra,
            kind,
            flags,
            data_size,
        )?),
        HeaderKind::EndOfArchive => Header::EndOfArchive(Rar5EndHeaderParser::parse(&mut fields)?),
        // Encryption parameters are only read from an intact header.
        HeaderKind::Encryption if !checksum_ok => {
            return Err(Violation::DamagedEncryptionHeader.into());
        }
        HeaderKind::Encryption => Header::Encryption(Rar5EncryptionHeaderParser::parse(&mut fields)?),
        HeaderKind::Auxiliary(_) => Header::Auxiliary(AuxHeader::Unknown {
            header_type,
            data_size: flags.has_data_area.then_some(data_size),
        }),
    };

    Ok(ParsedHeader {
        prefix: RawHeaderPrefix {
            checksum,
            header_type,
            flags: raw_flags,
            declared_size: header_size,
            skip_if_unknown: flags.skip_if_unknown,
        },
        header,
        header_size,
        payload_size: data_size,
        checksum_ok,
    })
}
