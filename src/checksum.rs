//! Header integrity checksums.
//!
//! Both schemas use CRC-32 (polynomial 0xEDB88320). RAR 1.5-4.x headers
//! store only the low 16 bits. The password check checksum of RAR5
//! encryption records is unrelated: the first four bytes of SHA-256 over
//! the 8-byte check value.

use sha2::{Digest, Sha256};

/// Length of a RAR5 password check value.
pub const SIZE_PSWCHECK: usize = 8;
/// Length of the checksum stored after a password check value.
pub const SIZE_PSWCHECK_CSUM: usize = 4;

/// Which header checksum a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// RAR 1.5-4.x: CRC-32 truncated to 16 bits.
    Legacy16,
    /// RAR 5.0: full CRC-32.
    Crc32,
}

impl ChecksumKind {
    /// Bytes at the start of a header occupied by the checksum itself.
    pub fn field_len(self) -> usize {
        match self {
            Self::Legacy16 => 2,
            Self::Crc32 => 4,
        }
    }
}

/// Running checksum over the bytes of one header record.
#[derive(Clone)]
pub struct ChecksumAccumulator {
    kind: ChecksumKind,
    hasher: crc32fast::Hasher,
}

impl ChecksumAccumulator {
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            kind,
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Checksum in the width stored by the record.
    pub fn finish(self) -> u32 {
        let crc = self.hasher.finalize();
        match self.kind {
            ChecksumKind::Legacy16 => crc & 0xFFFF,
            ChecksumKind::Crc32 => crc,
        }
    }

    /// Checksum of a raw header buffer that starts with the stored checksum
    /// field, covering `header[field_len..]`.
    pub fn of_header(kind: ChecksumKind, header: &[u8]) -> u32 {
        let mut acc = Self::new(kind);
        acc.update(header.get(kind.field_len()..).unwrap_or_default());
        acc.finish()
    }
}

impl std::fmt::Debug for ChecksumAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumAccumulator")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Checksum stored after a RAR5 password check value.
pub fn password_check_sum(check: &[u8; SIZE_PSWCHECK]) -> [u8; SIZE_PSWCHECK_CSUM] {
    let digest = Sha256::digest(check);
    let mut sum = [0u8; SIZE_PSWCHECK_CSUM];
    sum.copy_from_slice(&digest[..SIZE_PSWCHECK_CSUM]);
    sum
}

/// Whether a stored password check value survived intact.
pub fn password_check_intact(
    check: &[u8; SIZE_PSWCHECK],
    sum: &[u8; SIZE_PSWCHECK_CSUM],
) -> bool {
    password_check_sum(check) == *sum
}
