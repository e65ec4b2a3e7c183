//! Error types for RAR header decoding.
//!
//! This module provides the [`RarError`] type which covers every outcome of
//! header decoding that is not a successfully decoded record.
//!
//! ## Error Categories
//!
//! | Category | Errors | Reaches the caller? |
//! |----------|--------|---------------------|
//! | Input | [`Truncated`] | No, surfaces as `HeaderResult::NeedMoreBytes` |
//! | Integrity | [`ChecksumMismatch`] | No, the record is returned flagged broken |
//! | Structure | [`StructuralViolation`], [`MalformedVarint`] | No, triggers resynchronization |
//! | Encryption | [`PasswordRequired`], [`PasswordIncorrect`], [`UnsupportedEncryption`] | Yes |
//! | Fatal | [`FatalFormatMismatch`], [`ResyncExhausted`], [`Io`] | Yes |
//!
//! ## Example
//!
//! ```rust,ignore
//! use rar_headers::{HeaderDecoder, HeaderResult, RarError};
//!
//! loop {
//!     match decoder.read_next() {
//!         Ok(HeaderResult::Record(record)) => println!("{:?}", record.kind()),
//!         Ok(HeaderResult::Eof { .. }) => break,
//!         Ok(other) => { eprintln!("stopped: {:?}", other); break; }
//!         Err(RarError::PasswordRequired) => eprintln!("Headers are encrypted"),
//!         Err(e) => { eprintln!("Error: {}", e); break; }
//!     }
//! }
//! ```
//!
//! [`Truncated`]: RarError::Truncated
//! [`ChecksumMismatch`]: RarError::ChecksumMismatch
//! [`StructuralViolation`]: RarError::StructuralViolation
//! [`MalformedVarint`]: RarError::MalformedVarint
//! [`PasswordRequired`]: RarError::PasswordRequired
//! [`PasswordIncorrect`]: RarError::PasswordIncorrect
//! [`UnsupportedEncryption`]: RarError::UnsupportedEncryption
//! [`FatalFormatMismatch`]: RarError::FatalFormatMismatch
//! [`ResyncExhausted`]: RarError::ResyncExhausted
//! [`Io`]: RarError::Io

use std::io;

use thiserror::Error;

/// Error type for RAR header decoding.
#[derive(Debug, Error)]
pub enum RarError {
    /// Fewer bytes are available than the current read requires.
    ///
    /// Fully recoverable: top up the source and call `read_next()` again,
    /// decoding resumes from the same record start.
    #[error("truncated input: need {needed} more bytes")]
    Truncated {
        /// Minimum number of additional bytes required.
        needed: usize,
    },

    /// A variable-length integer did not terminate within 10 bytes.
    #[error("malformed variable-length integer")]
    MalformedVarint,

    /// The stored header checksum does not match the computed one.
    #[error("header checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Declared sizes contradict each other or the record layout.
    #[error("structural violation: {0}")]
    StructuralViolation(#[from] Violation),

    /// Headers are encrypted and no key material is available.
    #[error("password required to decode encrypted headers")]
    PasswordRequired,

    /// The supplied key material failed password verification or produced
    /// headers with bad checksums.
    #[error("incorrect password for encrypted headers")]
    PasswordIncorrect,

    /// Encryption header uses an unknown algorithm version or an
    /// out-of-range iteration count.
    #[error("unsupported header encryption (version {version}, lg2 count {lg2_count})")]
    UnsupportedEncryption { version: u64, lg2_count: u8 },

    /// The byte source does not start with a recognized RAR signature.
    #[error("not a recognized RAR archive")]
    FatalFormatMismatch,

    /// No valid record was found within the resynchronization budget.
    #[error("no valid header found after {attempts} resync attempts (from offset {start})")]
    ResyncExhausted { attempts: usize, start: u64 },

    /// An I/O error from the underlying byte source.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RarError {
    /// Whether this error should trigger resynchronization.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::StructuralViolation(_) | Self::MalformedVarint)
    }
}

/// Ways a header can be structurally impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    /// Declared header size is below the 7-byte minimum prefix.
    #[error("declared header size {size} below minimum {minimum}")]
    HeaderTooSmall { size: u64, minimum: u64 },

    /// The modern size field spans more than 3 bytes.
    #[error("header size field exceeds 3 bytes")]
    HeaderTooLarge,

    /// A field reads past the end of its header.
    #[error("field runs past the end of the header")]
    FieldOverrun,

    /// An extra-field entry declares more bytes than its table holds.
    #[error("extra field of {declared} bytes overruns {remaining} remaining")]
    ExtraFieldOverrun { declared: u64, remaining: u64 },

    /// The extra area is larger than the header or overlaps fixed fields.
    #[error("extra area of {extra_size} bytes does not fit header of {header_size} bytes")]
    ExtraAreaTooLarge { extra_size: u64, header_size: u64 },

    /// The next block would not start after the current one.
    #[error("next block at {next} does not advance past {current}")]
    NonAdvancing { current: u64, next: u64 },

    /// An encryption header failed its checksum. Its parameters cannot be
    /// trusted, so it is treated like any other impossible record.
    #[error("encryption header fails its checksum")]
    DamagedEncryptionHeader,

    /// Block size arithmetic overflowed.
    #[error("block size overflows the address space")]
    SizeOverflow,
}

pub type Result<T> = std::result::Result<T, RarError>;
