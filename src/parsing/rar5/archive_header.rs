//! RAR5 main archive header parser.
//!
//! Fields after the common prefix:
//! - vint: archive flags
//! - vint: volume number, if archive flags & 0x0002
//!
//! Extra area records: 1 = locator, 2 = archive metadata.

use super::extra::{read_string, ExtraFieldSink, ExtraFieldTable};
use crate::error::{Result, Violation};
use crate::formats::RawTimestamp;
use crate::parsing::RecordCursor;
use crate::record::{ArchiveMetadata, Locator, MainArchiveHeader};

pub const MHFL_VOLUME: u64 = 0x0001;
pub const MHFL_VOLNUMBER: u64 = 0x0002;
pub const MHFL_SOLID: u64 = 0x0004;
pub const MHFL_PROTECT: u64 = 0x0008;
pub const MHFL_LOCK: u64 = 0x0010;

pub const MHEXTRA_LOCATOR: u64 = 0x01;
pub const MHEXTRA_METADATA: u64 = 0x02;

const LOCATOR_QLIST: u64 = 0x01;
const LOCATOR_RR: u64 = 0x02;

const METADATA_NAME: u64 = 0x01;
const METADATA_CTIME: u64 = 0x02;
const METADATA_UNIXTIME: u64 = 0x04;
const METADATA_UNIX_NS: u64 = 0x08;

pub struct Rar5ArchiveHeaderParser;

impl Rar5ArchiveHeaderParser {
    /// Parse the main header fields and its extra area. Locator offsets are
    /// stored relative to `block_pos` and returned absolute.
    pub fn parse(
        fields: &mut RecordCursor<'_>,
        extra: &ExtraFieldTable<'_>,
        block_pos: u64,
    ) -> Result<MainArchiveHeader> {
        let flags = fields.read_varint()?;
        let volume_number = if flags & MHFL_VOLNUMBER != 0 {
            Some(fields.read_varint()?)
        } else {
            None
        };

        let is_volume = flags & MHFL_VOLUME != 0;
        let mut header = MainArchiveHeader {
            is_volume,
            is_solid: flags & MHFL_SOLID != 0,
            has_recovery: flags & MHFL_PROTECT != 0,
            is_locked: flags & MHFL_LOCK != 0,
            is_first_volume: is_volume && volume_number.unwrap_or(0) == 0,
            new_numbering: true,
            volume_number,
            ..Default::default()
        };

        extra.decode(&mut MainExtra {
            header: &mut header,
            block_pos,
        })?;

        Ok(header)
    }
}

struct MainExtra<'h> {
    header: &'h mut MainArchiveHeader,
    block_pos: u64,
}

impl MainExtra<'_> {
    fn absolute(&self, offset: u64) -> Result<Option<u64>> {
        if offset == 0 {
            return Ok(None);
        }
        offset
            .checked_add(self.block_pos)
            .map(Some)
            .ok_or_else(|| Violation::SizeOverflow.into())
    }
}

impl ExtraFieldSink for MainExtra<'_> {
    fn field(&mut self, tag: u64, payload: &mut RecordCursor<'_>) -> Result<()> {
        match tag {
            MHEXTRA_LOCATOR => {
                let flags = payload.read_varint()?;
                let mut locator = Locator::default();
                if flags & LOCATOR_QLIST != 0 {
                    let offset = payload.read_varint()?;
                    locator.quick_open_offset = self.absolute(offset)?;
                }
                if flags & LOCATOR_RR != 0 {
                    let offset = payload.read_varint()?;
                    locator.recovery_offset = self.absolute(offset)?;
                }
                self.header.locator = Some(locator);
            }
            MHEXTRA_METADATA => {
                let flags = payload.read_varint()?;
                let mut metadata = ArchiveMetadata::default();
                if flags & METADATA_NAME != 0 {
                    let name = read_string(payload)?;
                    if (1..=0xFFFF).contains(&name.len()) {
                        metadata.name = Some(name.trim_end_matches('\0').to_string());
                    }
                }
                if flags & METADATA_CTIME != 0 {
                    metadata.ctime = Some(if flags & METADATA_UNIXTIME != 0 {
                        if flags & METADATA_UNIX_NS != 0 {
                            RawTimestamp::from_unix_nanos(payload.read_u64()? as i64)
                        } else {
                            RawTimestamp::from_unix_secs(payload.read_u32()?)
                        }
                    } else {
                        RawTimestamp::from_windows_filetime(payload.read_u64()?)
                    });
                }
                self.header.metadata = Some(metadata);
            }
            _ => {}
        }
        Ok(())
    }
}
