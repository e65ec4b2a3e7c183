//! Position-tracking reader over a [`ByteSource`].
//!
//! All multi-byte integers are little-endian. Reads never block waiting for
//! input: when fewer bytes are available than requested the read fails with
//! [`RarError::Truncated`] carrying the shortfall, so the caller can top up
//! its buffer and retry from the same position.

use std::io::{self, Cursor};

use crate::error::{RarError, Result, Violation};
use crate::file_media::ByteSource;
use crate::parsing::rar5::vint::MAX_VINT_LEN;

/// Reader with an absolute position over a seekable byte source.
#[derive(Debug)]
pub struct ByteCursor<S> {
    source: S,
    pos: u64,
    /// Where the underlying source currently sits, if known.
    source_pos: Option<u64>,
    /// Last observed source length.
    len: Option<u64>,
    /// Running short is a layout error, not a request for more input.
    within_record: bool,
}

impl<S: ByteSource> ByteCursor<S> {
    /// Wrap a source, starting at its current position.
    pub fn new(mut source: S) -> Result<Self> {
        let pos = source.tell()?;
        Ok(Self {
            source,
            pos,
            source_pos: Some(pos),
            len: None,
            within_record: false,
        })
    }

    /// Absolute position of the next byte to be read.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Move to an absolute position. The source is only touched on the next read.
    pub fn seek_to(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        self.pos = self.pos.checked_add_signed(delta).ok_or_else(|| {
            RarError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of source",
            ))
        })?;
        Ok(())
    }

    /// Bytes between the current position and the end of the source, if the
    /// source length is known.
    pub fn bytes_available(&mut self) -> Result<Option<u64>> {
        self.len = self.source.total_len()?;
        Ok(self.len.map(|len| len.saturating_sub(self.pos)))
    }

    /// Length of the source as last reported.
    pub fn stream_len(&mut self) -> Result<Option<u64>> {
        self.len = self.source.total_len()?;
        Ok(self.len)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let wanted = buf.len();
        if wanted == 0 {
            return Ok(());
        }
        let cached_enough = self
            .len
            .is_some_and(|len| len.saturating_sub(self.pos) >= wanted as u64);
        if !cached_enough {
            if let Some(avail) = self.bytes_available()? {
                if avail < wanted as u64 {
                    // Counted from the end of the source, so a position past
                    // the end asks for the gap too.
                    let end = self.pos.saturating_add(wanted as u64);
                    let missing = end.saturating_sub(self.len.unwrap_or(0));
                    return Err(self.shortfall(missing as usize));
                }
            }
        }

        if self.source_pos != Some(self.pos) {
            self.source.seek(self.pos)?;
            self.source_pos = Some(self.pos);
        }

        let mut filled = 0;
        while filled < wanted {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.source_pos = None;
                    return Err(self.shortfall(wanted - filled));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.source_pos = None;
                    return Err(e.into());
                }
            }
        }

        self.pos += wanted as u64;
        self.source_pos = Some(self.pos);
        Ok(())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        self.read_into(&mut buffer)?;
        Ok(buffer)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a RAR5 variable-length integer (7 data bits per byte, high bit
    /// set on all but the last byte).
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for i in 0..MAX_VINT_LEN {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(RarError::MalformedVarint)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source, e.g. to append freshly received bytes.
    pub fn source_mut(&mut self) -> &mut S {
        self.source_pos = None;
        self.len = None;
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn shortfall(&self, needed: usize) -> RarError {
        if self.within_record {
            Violation::FieldOverrun.into()
        } else {
            RarError::Truncated { needed }
        }
    }
}

impl<'a> ByteCursor<Cursor<&'a [u8]>> {
    /// Cursor over the bytes of one fully loaded header. Reading past the end
    /// is a [`Violation::FieldOverrun`].
    pub fn over_record(bytes: &'a [u8]) -> Self {
        Self {
            source: Cursor::new(bytes),
            pos: 0,
            source_pos: Some(0),
            len: Some(bytes.len() as u64),
            within_record: true,
        }
    }

    /// Bytes from the current position to the end of the record.
    pub fn remaining(&self) -> &'a [u8] {
        let bytes = *self.source.get_ref();
        let start = (self.pos as usize).min(bytes.len());
        &bytes[start..]
    }

    /// Borrow the next `count` bytes without copying.
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let rest = self.remaining();
        if rest.len() < count {
            return Err(Violation::FieldOverrun.into());
        }
        self.pos += count as u64;
        Ok(&rest[..count])
    }
}
