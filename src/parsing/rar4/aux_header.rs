//! Parsers for the rarely used RAR 1.5-4.x header types: inline comment,
//! authenticity verification, signature, recovery record, old-style
//! sub-blocks and unknown types.

use super::LONG_BLOCK;
use crate::error::Result;
use crate::parsing::RecordCursor;
use crate::record::{
    AuxHeader, AuxKind, AvHeader, CommentHeader, OldServiceBody, OldServiceHeader, PackedBlock,
    ProtectionHeader, SignatureHeader,
};

pub const EA_HEAD: u16 = 0x100;
pub const UO_HEAD: u16 = 0x101;
pub const NTACL_HEAD: u16 = 0x104;
pub const STREAM_HEAD: u16 = 0x105;

pub struct AuxHeaderParser;

impl AuxHeaderParser {
    /// Parse the fields after the common prefix. Returns the header and the
    /// size of the data that follows it.
    pub fn parse(
        body: &mut RecordCursor<'_>,
        kind: AuxKind,
        flags: u16,
    ) -> Result<(AuxHeader, u64)> {
        Ok(match kind {
            AuxKind::Marker => (AuxHeader::Marker, 0),
            AuxKind::Comment => (AuxHeader::Comment(Self::parse_comment(body)?), 0),
            AuxKind::AuthenticityVerification => (
                AuxHeader::AuthenticityVerification(AvHeader {
                    version: body.read_u8()?,
                    method: body.read_u8()?,
                    av_version: body.read_u8()?,
                    crc: body.read_u32()?,
                }),
                0,
            ),
            AuxKind::Signature => (
                AuxHeader::Signature(SignatureHeader {
                    creation_time: body.read_u32()?,
                    arc_name_size: body.read_u16()?,
                    user_name_size: body.read_u16()?,
                }),
                0,
            ),
            AuxKind::Protection => {
                let protect = ProtectionHeader {
                    data_size: body.read_u32()?,
                    version: body.read_u8()?,
                    recovery_sectors: body.read_u16()?,
                    total_blocks: body.read_u32()?,
                    mark: body.read_array()?,
                };
                let data = u64::from(protect.data_size);
                (AuxHeader::Protection(protect), data)
            }
            AuxKind::OldService => {
                let sub = Self::parse_old_service(body)?;
                let data = u64::from(sub.data_size);
                (AuxHeader::OldService(sub), data)
            }
            AuxKind::Unknown(header_type) => {
                let data_size = if flags & LONG_BLOCK != 0 {
                    Some(u64::from(body.read_u32()?))
                } else {
                    None
                };
                (
                    AuxHeader::Unknown {
                        header_type,
                        data_size,
                    },
                    data_size.unwrap_or(0),
                )
            }
        })
    }

    /// Comment header fields, also used for comments embedded in the main
    /// header.
    pub fn parse_comment(body: &mut RecordCursor<'_>) -> Result<CommentHeader> {
        Ok(CommentHeader {
            unpacked_size: body.read_u16()?,
            version: body.read_u8()?,
            method: body.read_u8()?,
            crc: body.read_u16()?,
        })
    }

    fn parse_old_service(body: &mut RecordCursor<'_>) -> Result<OldServiceHeader> {
        let data_size = body.read_u32()?;
        let sub_type = body.read_u16()?;
        let level = body.read_u8()?;

        let contents = match sub_type {
            UO_HEAD => {
                let owner_size = body.read_u16()? as usize;
                let group_size = body.read_u16()? as usize;
                OldServiceBody::UnixOwner {
                    owner: body.take(owner_size)?.to_vec(),
                    group: body.take(group_size)?.to_vec(),
                }
            }
            EA_HEAD => OldServiceBody::Os2Ea(Self::parse_packed_block(body)?),
            NTACL_HEAD => OldServiceBody::NtfsAcl(Self::parse_packed_block(body)?),
            STREAM_HEAD => {
                let block = Self::parse_packed_block(body)?;
                let name_size = body.read_u16()? as usize;
                OldServiceBody::Stream {
                    block,
                    name: body.take(name_size)?.to_vec(),
                }
            }
            _ => OldServiceBody::Other,
        };

        Ok(OldServiceHeader {
            data_size,
            sub_type,
            level,
            body: contents,
        })
    }

    fn parse_packed_block(body: &mut RecordCursor<'_>) -> Result<PackedBlock> {
        Ok(PackedBlock {
            unpacked_size: body.read_u32()?,
            version: body.read_u8()?,
            method: body.read_u8()?,
            crc: body.read_u32()?,
        })
    }
}
