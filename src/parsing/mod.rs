//! RAR header parsing modules.
//!
//! [`rar4`] decodes the fixed-layout RAR 1.5-4.x headers, [`rar5`] the
//! vint-based RAR 5.0 headers. Both pull bytes through a [`HeaderLoader`]
//! and produce a [`ParsedHeader`]; placing the record in the stream is left
//! to the decoder.

use std::io::Cursor;

use crate::cursor::ByteCursor;
use crate::record::{Header, RawHeaderPrefix};

pub mod rar4;
pub mod rar5;
pub mod raw;

pub use raw::HeaderLoader;

/// Smallest possible header in either generation.
pub const MIN_HEADER_SIZE: u64 = 7;

/// Cursor over the bytes of one loaded header.
pub type RecordCursor<'a> = ByteCursor<Cursor<&'a [u8]>>;

/// A header decoded from its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub prefix: RawHeaderPrefix,
    pub header: Header,
    /// Header size without encryption padding.
    pub header_size: u64,
    /// Bytes of data following the header.
    pub payload_size: u64,
    /// Stored and computed checksums agree, or the record is never checked.
    pub checksum_ok: bool,
}
