//! Archive header parser.
//!
//! The archive header follows the marker header and contains
//! archive-level flags and the position of the authenticity record.

use crate::error::Result;
use crate::parsing::RecordCursor;
use crate::record::MainArchiveHeader;

pub const MHD_VOLUME: u16 = 0x0001;
pub const MHD_COMMENT: u16 = 0x0002;
pub const MHD_LOCK: u16 = 0x0004;
pub const MHD_SOLID: u16 = 0x0008;
pub const MHD_NEWNUMBERING: u16 = 0x0010;
pub const MHD_AV: u16 = 0x0020;
pub const MHD_PROTECT: u16 = 0x0040;
pub const MHD_PASSWORD: u16 = 0x0080;
pub const MHD_FIRSTVOLUME: u16 = 0x0100;

pub struct ArchiveHeaderParser;

impl ArchiveHeaderParser {
    /// Parse the fields after the common prefix.
    pub fn parse(body: &mut RecordCursor<'_>, flags: u16) -> Result<MainArchiveHeader> {
        let high_pos_av = body.read_u16()?;
        let pos_av = body.read_u32()?;

        Ok(MainArchiveHeader {
            is_volume: flags & MHD_VOLUME != 0,
            has_comment: flags & MHD_COMMENT != 0,
            is_locked: flags & MHD_LOCK != 0,
            is_solid: flags & MHD_SOLID != 0,
            new_numbering: flags & MHD_NEWNUMBERING != 0,
            has_authenticity: flags & MHD_AV != 0,
            has_recovery: flags & MHD_PROTECT != 0,
            encrypted_headers: flags & MHD_PASSWORD != 0,
            is_first_volume: flags & MHD_FIRSTVOLUME != 0,
            high_pos_av,
            pos_av,
            ..Default::default()
        })
    }
}
