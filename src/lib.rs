//! Resynchronizing RAR archive header decoder.
//!
//! Reads the record stream of RAR 1.5-4.x and RAR 5.0+ archives one header
//! at a time and reports where each record and its payload sit in the byte
//! stream. Payload bytes are never decompressed.
//!
//! ## Features
//! - Both header generations, detected from the signature (optionally
//!   behind a self-extracting stub)
//! - Incremental input: a short source yields `NeedMoreBytes`, not an error
//! - Damaged records are flagged `broken`; impossible ones are skipped by
//!   scanning forward one byte at a time
//! - Encrypted headers through a caller-supplied [`KeyProvider`]
//! - `crypto` - [`crypto::PasswordKeyProvider`] for password-protected
//!   archives (AES, SHA-1 and PBKDF2 key derivation)
//!
//! ```rust,ignore
//! use rar_headers::{HeaderDecoder, HeaderResult, LocalFileMedia};
//!
//! let mut decoder = HeaderDecoder::new(LocalFileMedia::open("movie.part1.rar")?)?;
//! while let HeaderResult::Record(record) = decoder.read_next()? {
//!     if let Some(entry) = record.as_entry() {
//!         println!("{} at {:?}", entry.name(), record.payload());
//!     }
//! }
//! ```

mod checksum;
#[cfg(feature = "crypto")]
pub mod crypto;
pub mod cursor;
mod decoder;
pub mod error;
mod file_media;
pub mod formats;
pub mod key;
pub mod parsing;
pub mod record;
#[cfg(test)]
mod testutil;

pub use checksum::{password_check_intact, password_check_sum, ChecksumAccumulator, ChecksumKind};
pub use decoder::{
    DecoderOptions, DecoderState, HeaderDecoder, HeaderResult, InlineComment, KeyStatus,
};
pub use error::{RarError, Result, Violation};
pub use file_media::{ByteSource, LocalFileMedia, ReadInterval};
pub use formats::{RawTimestamp, Signature, SignatureMatch};
pub use key::{
    ArchiveKeyPurpose, CryptoError, FormatGeneration, HeaderCipher, KdfParameters, KeyMaterial,
    KeyProvider, KeyRequest,
};
pub use record::{
    EncryptionHeader, EndOfArchiveHeader, EntryHeader, EntryKind, Header, HeaderKind,
    MainArchiveHeader, Record,
};
