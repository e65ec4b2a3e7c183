//! RAR format detection, signatures and timestamp encodings.

/// RAR file signature detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// RAR 1.5 to 4.x
    Rar15,
    /// RAR 5.0+
    Rar50,
}

/// Outcome of looking for a signature in the bytes read so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMatch {
    /// Signature found at `offset`.
    Found { signature: Signature, offset: usize },
    /// The data ends in what could still become a signature.
    NeedMore { needed: usize },
    /// No signature can start within the searched range.
    Mismatch,
}

impl Signature {
    pub const RAR15: &[u8; 7] = b"Rar!\x1a\x07\x00";
    pub const RAR50: &[u8; 8] = b"Rar!\x1a\x07\x01\x00";

    pub fn size(&self) -> u64 {
        match self {
            Self::Rar15 => 7,
            Self::Rar50 => 8,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() >= 8 && data.starts_with(Self::RAR50) {
            Some(Self::Rar50)
        } else if data.len() >= 7 && data.starts_with(Self::RAR15) {
            Some(Self::Rar15)
        } else {
            None
        }
    }

    /// Search for a signature starting at any offset up to `search_limit`.
    ///
    /// A limit of 0 requires the signature at the very start. Larger limits
    /// skip an executable stub in front of the archive (self-extracting
    /// archives).
    pub fn sniff(data: &[u8], search_limit: usize) -> SignatureMatch {
        let last = search_limit.min(data.len());
        for offset in 0..=last {
            let tail = &data[offset..];
            // Only empty input can still become a signature.
            if tail.is_empty() && offset > 0 {
                break;
            }
            if let Some(signature) = Self::from_bytes(tail) {
                return SignatureMatch::Found { signature, offset };
            }
            if let Some(needed) = Self::missing_after_prefix(tail) {
                return SignatureMatch::NeedMore { needed };
            }
        }
        SignatureMatch::Mismatch
    }

    /// Bytes still missing if `tail` is a proper prefix of a signature.
    fn missing_after_prefix(tail: &[u8]) -> Option<usize> {
        if tail.len() < Self::RAR15.len() && Self::RAR15.starts_with(tail) {
            Some(Self::RAR15.len() - tail.len())
        } else if tail.len() < Self::RAR50.len() && Self::RAR50.starts_with(tail) {
            Some(Self::RAR50.len() - tail.len())
        } else {
            None
        }
    }
}

/// Raw timestamp value (Unix nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTimestamp {
    pub nanos: i64,
}

impl RawTimestamp {
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn from_unix_secs(secs: u32) -> Self {
        Self {
            nanos: i64::from(secs) * 1_000_000_000,
        }
    }

    pub fn from_dos(dos_time: u32) -> Self {
        let second = ((dos_time & 0x1f) * 2) as i64;
        let minute = ((dos_time >> 5) & 0x3f) as i64;
        let hour = ((dos_time >> 11) & 0x1f) as i64;
        let day = ((dos_time >> 16) & 0x1f) as i64;
        let month = ((dos_time >> 21) & 0x0f) as i64;
        let year = ((dos_time >> 25) + 1980) as i64;

        let mut days: i64 = (1970..year).map(|y| if is_leap(y) { 366 } else { 365 }).sum();
        let month_days = [
            31,
            if is_leap(year) { 29 } else { 28 },
            31,
            30,
            31,
            30,
            31,
            31,
            30,
            31,
            30,
            31,
        ];
        days += month_days
            .iter()
            .take((month - 1).clamp(0, 11) as usize)
            .sum::<i64>();
        days += (day - 1).max(0);

        let secs = days * 86400 + hour * 3600 + minute * 60 + second;
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    pub fn from_windows_filetime(filetime: u64) -> Self {
        const WINDOWS_TICK_NS: i128 = 100;
        const EPOCH_DIFF: i128 = 11_644_473_600_000_000_000;
        let unix_ns = (filetime as i128) * WINDOWS_TICK_NS - EPOCH_DIFF;
        Self::from_unix_nanos(unix_ns.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    pub fn saturating_add(self, add_nanos: i64) -> Self {
        Self {
            nanos: self.nanos.saturating_add(add_nanos),
        }
    }

    /// Whole seconds since the Unix epoch.
    pub fn unix_secs(&self) -> i64 {
        self.nanos.div_euclid(1_000_000_000)
    }
}

fn is_leap(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_at_start() {
        assert_eq!(
            Signature::sniff(b"Rar!\x1a\x07\x00\x33\x00", 0),
            SignatureMatch::Found {
                signature: Signature::Rar15,
                offset: 0
            }
        );
        assert_eq!(
            Signature::sniff(b"Rar!\x1a\x07\x01\x00", 0),
            SignatureMatch::Found {
                signature: Signature::Rar50,
                offset: 0
            }
        );
    }

    #[test]
    fn test_signature_partial() {
        assert_eq!(Signature::sniff(b"", 0), SignatureMatch::NeedMore { needed: 7 });
        assert_eq!(Signature::sniff(b"Rar", 0), SignatureMatch::NeedMore { needed: 4 });
        // Only the RAR5 signature continues with 0x01.
        assert_eq!(
            Signature::sniff(b"Rar!\x1a\x07\x01", 0),
            SignatureMatch::NeedMore { needed: 1 }
        );
        assert_eq!(Signature::sniff(b"PK\x03\x04", 0), SignatureMatch::Mismatch);
        assert_eq!(Signature::sniff(b"Rar!\x1a\x07\x02\x00", 0), SignatureMatch::Mismatch);
    }

    #[test]
    fn test_signature_after_stub() {
        let mut data = b"MZ\x90\x00stub".to_vec();
        data.extend_from_slice(Signature::RAR50);
        assert_eq!(Signature::sniff(&data, 0), SignatureMatch::Mismatch);
        assert_eq!(
            Signature::sniff(&data, 64),
            SignatureMatch::Found {
                signature: Signature::Rar50,
                offset: 8
            }
        );
        assert_eq!(Signature::sniff(&data, 7), SignatureMatch::Mismatch);
    }

    #[test]
    fn test_search_window_longer_than_data() {
        let zip = b"PK\x03\x04 zip file contents";
        assert_eq!(Signature::sniff(zip, 200), SignatureMatch::Mismatch);
        assert_eq!(Signature::sniff(b"", 200), SignatureMatch::NeedMore { needed: 7 });
        // A signature prefix at the end of a stub still asks for the rest.
        assert_eq!(
            Signature::sniff(b"MZ\x90\x00Rar!\x1a", 200),
            SignatureMatch::NeedMore { needed: 2 }
        );
    }

    #[test]
    fn test_dos_time() {
        // 2021-03-04 05:06:08
        let dos = (41 << 25) | (3 << 21) | (4 << 16) | (5 << 11) | (6 << 5) | 4;
        assert_eq!(RawTimestamp::from_dos(dos).unix_secs(), 1_614_834_368);
    }

    #[test]
    fn test_windows_filetime() {
        assert_eq!(RawTimestamp::from_windows_filetime(116_444_736_000_000_000).nanos, 0);
        assert_eq!(
            RawTimestamp::from_windows_filetime(116_444_736_010_000_000).nanos,
            1_000_000_000
        );
    }
}
