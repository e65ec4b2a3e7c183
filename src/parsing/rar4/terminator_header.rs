//! Terminator header parser.
//!
//! The terminator header marks the end of a RAR archive (or volume).

use crate::error::Result;
use crate::parsing::RecordCursor;
use crate::record::EndOfArchiveHeader;

pub const EARC_NEXT_VOLUME: u16 = 0x0001;
pub const EARC_DATACRC: u16 = 0x0002;
pub const EARC_REVSPACE: u16 = 0x0004;
pub const EARC_VOLNUMBER: u16 = 0x0008;

pub struct TerminatorHeaderParser;

impl TerminatorHeaderParser {
    pub fn parse(body: &mut RecordCursor<'_>, flags: u16) -> Result<EndOfArchiveHeader> {
        let data_crc = if flags & EARC_DATACRC != 0 {
            Some(body.read_u32()?)
        } else {
            None
        };
        let volume_number = if flags & EARC_VOLNUMBER != 0 {
            Some(body.read_u16()?)
        } else {
            None
        };

        Ok(EndOfArchiveHeader {
            next_volume: flags & EARC_NEXT_VOLUME != 0,
            volume_number,
            data_crc,
            rev_space: flags & EARC_REVSPACE != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;

    #[test]
    fn test_bare_terminator() {
        let mut cursor = ByteCursor::over_record(&[]);
        let end = TerminatorHeaderParser::parse(&mut cursor, 0).unwrap();
        assert_eq!(end, EndOfArchiveHeader::default());
    }

    #[test]
    fn test_volume_terminator() {
        let body = [0x78, 0x56, 0x34, 0x12, 0x03, 0x00];
        let mut cursor = ByteCursor::over_record(&body);
        let end = TerminatorHeaderParser::parse(
            &mut cursor,
            EARC_NEXT_VOLUME | EARC_DATACRC | EARC_VOLNUMBER,
        )
        .unwrap();
        assert!(end.next_volume);
        assert_eq!(end.data_crc, Some(0x12345678));
        assert_eq!(end.volume_number, Some(3));
        assert!(!end.rev_space);
    }
}
