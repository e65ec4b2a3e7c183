//! RAR5 file and service header parser.
//!
//! Fields after the common prefix:
//! - vint: file flags
//! - vint: unpacked size
//! - vint: attributes
//! - u32: mtime, if file flags & 0x0002
//! - u32: data CRC-32, if file flags & 0x0004
//! - vint: compression information
//! - vint: host OS
//! - vint: name length, then the UTF-8 name
//!
//! Service headers share the layout; their name says what they hold
//! (`CMT`, `QO`, `ACL`, `STM`, `RR`).

use super::extra::{read_string, ExtraFieldSink, ExtraFieldTable};
use super::Rar5HeaderFlags;
use crate::checksum::password_check_intact;
use crate::error::{Result, Violation};
use crate::formats::RawTimestamp;
use crate::parsing::RecordCursor;
use crate::record::{
    CompressionInfo, ContentHash, EntryEncryption, EntryFlags, EntryHeader, EntryKind, EntryName,
    HostOs, NameEncoding, Redirect, RedirectKind, UnixOwner,
};

/// RAR5 file flags (specific to file header).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rar5FileFlags {
    /// File is a directory
    pub is_directory: bool,
    /// File modification time is present
    pub has_mtime: bool,
    /// File CRC32 is present
    pub has_crc32: bool,
    /// Unpacked size is unknown
    pub unpacked_size_unknown: bool,
}

impl From<u64> for Rar5FileFlags {
    fn from(flags: u64) -> Self {
        Self {
            is_directory: flags & 0x0001 != 0,
            has_mtime: flags & 0x0002 != 0,
            has_crc32: flags & 0x0004 != 0,
            unpacked_size_unknown: flags & 0x0008 != 0,
        }
    }
}

pub const FHEXTRA_CRYPT: u64 = 0x01;
pub const FHEXTRA_HASH: u64 = 0x02;
pub const FHEXTRA_HTIME: u64 = 0x03;
pub const FHEXTRA_VERSION: u64 = 0x04;
pub const FHEXTRA_REDIR: u64 = 0x05;
pub const FHEXTRA_UOWNER: u64 = 0x06;
pub const FHEXTRA_SUBDATA: u64 = 0x07;

const CRYPT_PSWCHECK: u64 = 0x01;
const CRYPT_USEMAC: u64 = 0x02;

const HASH_BLAKE2: u64 = 0x00;

const HTIME_UNIXTIME: u64 = 0x01;
const HTIME_MTIME: u64 = 0x02;
const HTIME_CTIME: u64 = 0x04;
const HTIME_ATIME: u64 = 0x08;
const HTIME_UNIX_NS: u64 = 0x10;

const REDIR_DIR: u64 = 0x01;

const UOWNER_UNAME: u64 = 0x01;
const UOWNER_GNAME: u64 = 0x02;
const UOWNER_NUMUID: u64 = 0x04;
const UOWNER_NUMGID: u64 = 0x08;

/// Decode the compression information field into method, decoder version
/// and dictionary size.
pub fn decode_compression_info(info: u64, is_directory: bool) -> CompressionInfo {
    let method = ((info >> 7) & 0x7) as u8;
    let is_solid = info & 0x40 != 0;
    let (unpack_version, dictionary_size) = match info & 0x3f {
        0 => (50, 0x20000u64 << ((info >> 10) & 0xf)),
        1 => {
            let base = 0x20000u64 << ((info >> 10) & 0x1f);
            (70, base + base / 32 * ((info >> 15) & 0x1f))
        }
        _ => (0, 0),
    };
    CompressionInfo {
        method,
        unpack_version,
        is_solid,
        dictionary_size: if is_directory { 0 } else { dictionary_size },
    }
}

pub struct Rar5FileHeaderParser;

impl Rar5FileHeaderParser {
    pub fn parse(
        fields: &mut RecordCursor<'_>,
        extra: &ExtraFieldTable<'_>,
        kind: EntryKind,
        header_flags: Rar5HeaderFlags,
        data_size: u64,
    ) -> Result<EntryHeader> {
        let file_flags = Rar5FileFlags::from(fields.read_varint()?);
        let unpacked_size = fields.read_varint()?;
        let attributes = fields.read_varint()?;
        let mtime = if file_flags.has_mtime {
            Some(RawTimestamp::from_unix_secs(fields.read_u32()?))
        } else {
            None
        };
        let crc = if file_flags.has_crc32 {
            Some(fields.read_u32()?)
        } else {
            None
        };
        let compression = decode_compression_info(fields.read_varint()?, file_flags.is_directory);
        let host_os = HostOs::from_modern(fields.read_varint()?);
        let name_len = fields.read_varint()?;
        let name_len = usize::try_from(name_len).map_err(|_| Violation::FieldOverrun)?;
        let raw = fields.take(name_len)?.to_vec();

        let mut entry = EntryHeader::new(kind);
        entry.packed_size = data_size;
        entry.unpacked_size = (!file_flags.unpacked_size_unknown).then_some(unpacked_size);
        entry.mtime = mtime;
        entry.hash = crc.map_or(ContentHash::None, ContentHash::Crc32);
        entry.compression = compression;
        entry.host_os = host_os;
        entry.attributes = attributes;
        entry.name = EntryName {
            text: String::from_utf8_lossy(&raw).into_owned(),
            raw,
            encoding: NameEncoding::Utf8,
        };
        entry.flags = EntryFlags {
            split_before: header_flags.split_before,
            split_after: header_flags.split_after,
            is_solid: compression.is_solid,
            is_directory: file_flags.is_directory,
            inherited: header_flags.is_inherited,
            child: header_flags.is_child,
            ..EntryFlags::default()
        };

        extra.decode(&mut EntryExtra { entry: &mut entry })?;

        Ok(entry)
    }
}

struct EntryExtra<'e> {
    entry: &'e mut EntryHeader,
}

impl EntryExtra<'_> {
    fn encryption(&mut self, payload: &mut RecordCursor<'_>) -> Result<()> {
        self.entry.flags.is_encrypted = true;
        let version = payload.read_varint()?;
        if version != 0 {
            self.entry.extensions.encryption = Some(EntryEncryption {
                version,
                ..EntryEncryption::default()
            });
            return Ok(());
        }

        let flags = payload.read_varint()?;
        let mut crypt = EntryEncryption {
            version,
            use_mac: flags & CRYPT_USEMAC != 0,
            lg2_count: payload.read_u8()?,
            salt: payload.read_array()?,
            iv: payload.read_array()?,
            ..EntryEncryption::default()
        };
        if flags & CRYPT_PSWCHECK != 0 {
            let check: [u8; 8] = payload.read_array()?;
            let sum: [u8; 4] = payload.read_array()?;
            // Service records may carry an all-zero check.
            let blank = self.entry.kind == EntryKind::Service && check == [0; 8];
            if password_check_intact(&check, &sum) && !blank {
                crypt.password_check = Some(check);
            }
        }
        self.entry.extensions.encryption = Some(crypt);
        Ok(())
    }

    fn times(&mut self, payload: &mut RecordCursor<'_>) -> Result<()> {
        let flags = payload.read_varint()?;
        let unix = flags & HTIME_UNIXTIME != 0;
        let mut read_time = |present: bool| -> Result<Option<RawTimestamp>> {
            if !present {
                return Ok(None);
            }
            Ok(Some(if unix {
                RawTimestamp::from_unix_secs(payload.read_u32()?)
            } else {
                RawTimestamp::from_windows_filetime(payload.read_u64()?)
            }))
        };
        let mtime = read_time(flags & HTIME_MTIME != 0)?;
        let ctime = read_time(flags & HTIME_CTIME != 0)?;
        let atime = read_time(flags & HTIME_ATIME != 0)?;

        let mut slots = [mtime, ctime, atime];
        if unix && flags & HTIME_UNIX_NS != 0 {
            for slot in slots.iter_mut() {
                if let Some(time) = slot {
                    let ns = payload.read_u32()? & 0x3fff_ffff;
                    if ns < 1_000_000_000 {
                        *time = time.saturating_add(i64::from(ns));
                    }
                }
            }
        }

        let [mtime, ctime, atime] = slots;
        if mtime.is_some() {
            self.entry.mtime = mtime;
        }
        self.entry.ctime = ctime;
        self.entry.atime = atime;
        Ok(())
    }
}

impl ExtraFieldSink for EntryExtra<'_> {
    fn field(&mut self, tag: u64, payload: &mut RecordCursor<'_>) -> Result<()> {
        match tag {
            FHEXTRA_CRYPT => self.encryption(payload)?,
            FHEXTRA_HASH => {
                if payload.read_varint()? == HASH_BLAKE2 {
                    self.entry.hash = ContentHash::Blake2sp(payload.read_array()?);
                }
            }
            FHEXTRA_HTIME => self.times(payload)?,
            FHEXTRA_VERSION => {
                let _flags = payload.read_varint()?;
                let number = payload.read_varint()?;
                if number != 0 {
                    self.entry.extensions.version = Some(number);
                    self.entry.flags.has_version = true;
                }
            }
            FHEXTRA_REDIR => {
                let kind = RedirectKind::from(payload.read_varint()?);
                let flags = payload.read_varint()?;
                self.entry.extensions.redirect = Some(Redirect {
                    kind,
                    is_directory: flags & REDIR_DIR != 0,
                    target: read_string(payload)?,
                });
            }
            FHEXTRA_UOWNER => {
                let flags = payload.read_varint()?;
                let mut owner = UnixOwner::default();
                if flags & UOWNER_UNAME != 0 {
                    owner.user = Some(read_string(payload)?);
                }
                if flags & UOWNER_GNAME != 0 {
                    owner.group = Some(read_string(payload)?);
                }
                if flags & UOWNER_NUMUID != 0 {
                    owner.uid = Some(payload.read_varint()?);
                }
                if flags & UOWNER_NUMGID != 0 {
                    owner.gid = Some(payload.read_varint()?);
                }
                self.entry.extensions.owner = Some(owner);
            }
            FHEXTRA_SUBDATA => {
                self.entry.sub_data = Some(payload.remaining().to_vec());
            }
            _ => {}
        }
        Ok(())
    }
}
