//! Variable-length integer (vint) parsing for RAR5.
//!
//! RAR5 uses variable-length integers where each byte contributes 7 bits
//! of data, and the high bit indicates if more bytes follow.
//!
//! Format:
//! - Bits 0-6: Data bits
//! - Bit 7: Continuation flag (1 = more bytes follow)

/// A u64 needs at most 10 vint bytes.
pub const MAX_VINT_LEN: usize = 10;

/// Why a vint could not be read from a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VintError {
    /// The slice ended before the terminating byte.
    Incomplete,
    /// No terminating byte within the allowed length.
    TooLong,
}

/// Read a variable-length integer from a byte slice, using at most
/// `max_len` bytes. Returns the value and the number of bytes consumed.
#[inline]
pub fn read_vint_bounded(data: &[u8], max_len: usize) -> Result<(u64, usize), VintError> {
    let mut result = 0u64;

    for (i, &byte) in data.iter().enumerate() {
        if i >= max_len {
            return Err(VintError::TooLong);
        }

        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    if data.len() >= max_len {
        Err(VintError::TooLong)
    } else {
        Err(VintError::Incomplete)
    }
}

/// Read a variable-length integer from a byte slice.
/// Returns the value and the number of bytes consumed.
#[inline]
pub fn read_vint(data: &[u8]) -> Option<(u64, usize)> {
    read_vint_bounded(data, MAX_VINT_LEN).ok()
}

/// Encode a value as a vint.
#[cfg(test)]
pub(crate) fn encode_vint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VINT_LEN);
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_vint() {
        // Values 0-127 fit in one byte
        assert_eq!(read_vint(&[0x00]), Some((0, 1)));
        assert_eq!(read_vint(&[0x7F]), Some((127, 1)));
        assert_eq!(read_vint(&[0x01]), Some((1, 1)));
    }

    #[test]
    fn test_two_byte_vint() {
        // 128 = 0x80 in first byte (continuation) + 0x01 in second
        assert_eq!(read_vint(&[0x80, 0x01]), Some((128, 2)));
        assert_eq!(read_vint(&[0xFF, 0x01]), Some((255, 2)));
    }

    #[test]
    fn test_larger_vint() {
        assert_eq!(read_vint(&[0x80, 0x80, 0x01]), Some((16384, 3)));
    }

    #[test]
    fn test_round_trip_boundaries() {
        for value in [0, 1, 127, 128, (1 << 21) - 1, 1 << 21, u64::MAX] {
            let encoded = encode_vint(value);
            assert_eq!(read_vint(&encoded), Some((value, encoded.len())), "{value}");
        }
        assert_eq!(encode_vint(u64::MAX).len(), MAX_VINT_LEN);
        assert_eq!(encode_vint((1 << 21) - 1).len(), 3);
        assert_eq!(encode_vint(1 << 21).len(), 4);
    }

    #[test]
    fn test_bounded() {
        // 3-byte cap used by the RAR5 header size field
        assert_eq!(read_vint_bounded(&[0xFF, 0xFF, 0x7F], 3), Ok((0x1F_FFFF, 3)));
        assert_eq!(
            read_vint_bounded(&[0x80, 0x80, 0x80, 0x01], 3),
            Err(VintError::TooLong)
        );
        assert_eq!(read_vint_bounded(&[0x80, 0x80], 3), Err(VintError::Incomplete));
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(read_vint(&[]), None);
        assert_eq!(read_vint_bounded(&[], 3), Err(VintError::Incomplete));
    }

    #[test]
    fn test_overlong_vint() {
        assert_eq!(read_vint_bounded(&[0x80; 11], MAX_VINT_LEN), Err(VintError::TooLong));
    }
}
