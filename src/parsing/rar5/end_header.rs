//! RAR5 end of archive header parser.
//!
//! The end header marks the end of the archive and contains
//! optional flags about the archive state.

use crate::error::Result;
use crate::parsing::RecordCursor;
use crate::record::EndOfArchiveHeader;

/// Archive continues in next volume.
pub const EHFL_NEXTVOLUME: u64 = 0x0001;

pub struct Rar5EndHeaderParser;

impl Rar5EndHeaderParser {
    pub fn parse(fields: &mut RecordCursor<'_>) -> Result<EndOfArchiveHeader> {
        let flags = fields.read_varint()?;
        Ok(EndOfArchiveHeader {
            next_volume: flags & EHFL_NEXTVOLUME != 0,
            ..EndOfArchiveHeader::default()
        })
    }
}
