//! File header parser.
//!
//! Each file in a RAR archive has a file header that describes
//! the file's name, size, compression method, etc. Service headers
//! (type 0x7a) share the layout and may carry sub-data after the name.
//!
//! Layout after the common prefix:
//! - u32: packed size, low half
//! - u32: unpacked size, low half
//! - u8: host OS
//! - u32: file CRC-32
//! - u32: DOS modification time
//! - u8: unpack version
//! - u8: method (0x30 = store ... 0x35 = best)
//! - u16: name size
//! - u32: attributes
//! - if LHD_LARGE: u32 packed high, u32 unpacked high
//! - name, [service sub-data], [salt], [extended time]

use super::name::decode_name;
use crate::error::Result;
use crate::formats::RawTimestamp;
use crate::parsing::RecordCursor;
use crate::record::{
    CompressionInfo, ContentHash, EntryFlags, EntryHeader, EntryKind, HostOs,
};

pub const LHD_SPLIT_BEFORE: u16 = 0x0001;
pub const LHD_SPLIT_AFTER: u16 = 0x0002;
pub const LHD_PASSWORD: u16 = 0x0004;
pub const LHD_COMMENT: u16 = 0x0008;
pub const LHD_SOLID: u16 = 0x0010;
pub const LHD_WINDOWMASK: u16 = 0x00e0;
pub const LHD_DIRECTORY: u16 = 0x00e0;
pub const LHD_LARGE: u16 = 0x0100;
pub const LHD_UNICODE: u16 = 0x0200;
pub const LHD_SALT: u16 = 0x0400;
pub const LHD_VERSION: u16 = 0x0800;
pub const LHD_EXTTIME: u16 = 0x1000;

/// Fixed part of a file header, prefix included.
pub const FILE_HEAD_SIZE: usize = 32;

pub struct FileHeaderParser;

impl FileHeaderParser {
    /// Parse the fields after the common prefix. `header_size` is the
    /// declared size, needed to find the service sub-data.
    pub fn parse(
        body: &mut RecordCursor<'_>,
        kind: EntryKind,
        flags: u16,
        header_size: usize,
    ) -> Result<EntryHeader> {
        let pack_low = body.read_u32()?;
        let unp_low = body.read_u32()?;
        let host_os = body.read_u8()?;
        let file_crc = body.read_u32()?;
        let dos_time = body.read_u32()?;
        let unpack_version = body.read_u8()?;
        let method = body.read_u8()?;
        let name_size = body.read_u16()? as usize;
        let attributes = body.read_u32()?;

        let large = flags & LHD_LARGE != 0;
        let (pack_high, unp_high) = if large {
            (body.read_u32()?, body.read_u32()?)
        } else {
            (0, 0)
        };

        let packed_size = u64::from(pack_high) << 32 | u64::from(pack_low);
        // All bits set means the archiver was writing from a stream.
        let unpacked_size = if unp_low == u32::MAX && (!large || unp_high == u32::MAX) {
            None
        } else {
            Some(u64::from(unp_high) << 32 | u64::from(unp_low))
        };

        let name = decode_name(body.take(name_size)?, flags & LHD_UNICODE != 0);

        let mut entry = EntryHeader::new(kind);

        if kind == EntryKind::Service {
            let fixed = FILE_HEAD_SIZE
                + name_size
                + if large { 8 } else { 0 }
                + if flags & LHD_SALT != 0 { 8 } else { 0 };
            if let Some(len) = header_size.checked_sub(fixed).filter(|&len| len > 0) {
                if flags & LHD_EXTTIME == 0 {
                    entry.sub_data = Some(body.take(len)?.to_vec());
                }
            }
        }

        if flags & LHD_SALT != 0 {
            entry.salt = Some(body.read_array()?);
        }

        let is_directory = flags & LHD_WINDOWMASK == LHD_DIRECTORY;
        entry.mtime = Some(RawTimestamp::from_dos(dos_time));
        if flags & LHD_EXTTIME != 0 {
            read_ext_time(body, &mut entry, dos_time)?;
        }

        entry.packed_size = packed_size;
        entry.unpacked_size = unpacked_size;
        entry.hash = ContentHash::Crc32(file_crc);
        entry.compression = CompressionInfo {
            method: method.wrapping_sub(0x30),
            unpack_version: u16::from(unpack_version),
            is_solid: flags & LHD_SOLID != 0,
            dictionary_size: if is_directory {
                0
            } else {
                0x10000 << ((flags & LHD_WINDOWMASK) >> 5)
            },
        };
        entry.flags = EntryFlags {
            split_before: flags & LHD_SPLIT_BEFORE != 0,
            split_after: flags & LHD_SPLIT_AFTER != 0,
            is_solid: flags & LHD_SOLID != 0,
            is_directory,
            is_encrypted: flags & LHD_PASSWORD != 0,
            large_size: large,
            has_comment: flags & LHD_COMMENT != 0,
            has_salt: flags & LHD_SALT != 0,
            has_version: flags & LHD_VERSION != 0,
            has_ext_time: flags & LHD_EXTTIME != 0,
            inherited: false,
            child: false,
        };
        entry.host_os = HostOs::from_legacy(host_os);
        entry.attributes = u64::from(attributes);
        entry.name = name;

        Ok(entry)
    }
}

/// Extended time block: a u16 with four 4-bit groups (mtime, ctime, atime,
/// archive time, most significant first). In each group bit 3 marks the time
/// present, bit 2 adds one second and bits 0-1 count the bytes of 100 ns
/// remainder that follow. Times other than mtime bring their own DOS time.
fn read_ext_time(body: &mut RecordCursor<'_>, entry: &mut EntryHeader, dos_mtime: u32) -> Result<()> {
    let flags = body.read_u16()?;

    for i in 0..4 {
        let rmode = (flags >> ((3 - i) * 4)) & 0xf;
        if rmode & 0x8 == 0 {
            continue;
        }
        let base = if i == 0 { dos_mtime } else { body.read_u32()? };
        let mut time = RawTimestamp::from_dos(base);
        if rmode & 0x4 != 0 {
            time = time.saturating_add(1_000_000_000);
        }
        let count = usize::from(rmode & 0x3);
        let mut rem = 0u32;
        for j in 0..count {
            rem |= u32::from(body.read_u8()?) << ((j + 3 - count) * 8);
        }
        time = time.saturating_add(i64::from(rem) * 100);

        let slot = match i {
            0 => &mut entry.mtime,
            1 => &mut entry.ctime,
            2 => &mut entry.atime,
            _ => &mut entry.arctime,
        };
        *slot = Some(time);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;
    use crate::record::NameEncoding;
    use crate::testutil::Rar4File;

    fn parse(file: &Rar4File, kind: EntryKind) -> EntryHeader {
        let header = file.header_bytes();
        let flags = u16::from_le_bytes([header[3], header[4]]);
        let mut cursor = ByteCursor::over_record(&header);
        cursor.seek_to(7);
        FileHeaderParser::parse(&mut cursor, kind, flags, header.len()).unwrap()
    }

    #[test]
    fn test_parse_file_header() {
        let file = Rar4File::new("test.txt").sizes(10, 20).crc(0xDEADBEEF);
        let entry = parse(&file, EntryKind::File);
        assert_eq!(entry.name(), "test.txt");
        assert_eq!(entry.name.encoding, NameEncoding::SingleByte);
        assert_eq!(entry.packed_size, 10);
        assert_eq!(entry.unpacked_size, Some(20));
        assert_eq!(entry.hash, ContentHash::Crc32(0xDEADBEEF));
        assert_eq!(entry.host_os, HostOs::Windows);
        assert_eq!(entry.compression.method, 3);
        assert_eq!(entry.compression.unpack_version, 29);
        assert_eq!(entry.compression.dictionary_size, 0x10000);
        assert!(!entry.is_directory());
    }

    #[test]
    fn test_unknown_unpacked_size() {
        let file = Rar4File::new("stream.bin").sizes(100, 0xFFFF_FFFF);
        let entry = parse(&file, EntryKind::File);
        assert!(entry.unknown_unpacked_size());
        assert_eq!(entry.packed_size, 100);
    }

    #[test]
    fn test_large_sizes() {
        let file = Rar4File::new("big.iso")
            .flags(LHD_LARGE)
            .sizes(0x1_0000_0005, 0x2_FFFF_FFFF);
        let entry = parse(&file, EntryKind::File);
        assert!(entry.flags.large_size);
        assert_eq!(entry.packed_size, 0x1_0000_0005);
        // Only both halves set mean unknown.
        assert_eq!(entry.unpacked_size, Some(0x2_FFFF_FFFF));
    }

    #[test]
    fn test_directory_and_flags() {
        let file = Rar4File::new("dir")
            .flags(LHD_DIRECTORY | LHD_SPLIT_AFTER | LHD_PASSWORD | LHD_SOLID);
        let entry = parse(&file, EntryKind::File);
        assert!(entry.is_directory());
        assert_eq!(entry.compression.dictionary_size, 0);
        assert!(entry.flags.split_after);
        assert!(!entry.flags.split_before);
        assert!(entry.flags.is_encrypted);
        assert!(entry.flags.is_solid);
    }

    #[test]
    fn test_salt() {
        let file = Rar4File::new("secret").flags(LHD_SALT).salt([1, 2, 3, 4, 5, 6, 7, 8]);
        let entry = parse(&file, EntryKind::File);
        assert_eq!(entry.salt, Some([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn test_ext_time() {
        // mtime: +1 s and one remainder byte. ctime: own DOS time only.
        let dos: u32 = (41 << 25) | (3 << 21) | (4 << 16);
        let mut ext = 0xD800u16.to_le_bytes().to_vec();
        ext.push(0x05);
        ext.extend_from_slice(&dos.to_le_bytes());
        let file = Rar4File::new("t").flags(LHD_EXTTIME).dos_time(dos).ext_time(&ext);
        let entry = parse(&file, EntryKind::File);

        let base = RawTimestamp::from_dos(dos);
        // One remainder byte lands in the top byte of the 24-bit remainder.
        assert_eq!(
            entry.mtime,
            Some(base.saturating_add(1_000_000_000 + 0x05_0000 * 100))
        );
        assert_eq!(entry.ctime, Some(base));
        assert_eq!(entry.atime, None);
        assert_eq!(entry.arctime, None);
    }

    #[test]
    fn test_ext_time_all_slots() {
        let dos: u32 = (40 << 25) | (1 << 21) | (1 << 16);
        // mtime 8, ctime 8, atime 8, arctime 8: no remainders.
        let mut ext = 0x8888u16.to_le_bytes().to_vec();
        for _ in 0..3 {
            ext.extend_from_slice(&dos.to_le_bytes());
        }
        let file = Rar4File::new("t").flags(LHD_EXTTIME).dos_time(dos).ext_time(&ext);
        let entry = parse(&file, EntryKind::File);
        let base = Some(RawTimestamp::from_dos(dos));
        assert_eq!(entry.mtime, base);
        assert_eq!(entry.ctime, base);
        assert_eq!(entry.atime, base);
        assert_eq!(entry.arctime, base);
    }

    #[test]
    fn test_service_sub_data() {
        let file = Rar4File::new("CMT").sub_data(b"comment data");
        let entry = parse(&file, EntryKind::Service);
        assert_eq!(entry.kind, EntryKind::Service);
        assert_eq!(entry.sub_data.as_deref(), Some(&b"comment data"[..]));
    }

    #[test]
    fn test_name_overrun_is_structural() {
        let mut header = Rar4File::new("name").header_bytes();
        header[26] = 200;
        let mut cursor = ByteCursor::over_record(&header);
        cursor.seek_to(7);
        let err = FileHeaderParser::parse(&mut cursor, EntryKind::File, 0, header.len()).unwrap_err();
        assert!(err.is_structural());
    }
}
