//! RAR5 archive encryption header parser.
//!
//! The archive encryption header (type 4) appears in archives with encrypted
//! headers. Every header after it is stored as a 16-byte IV followed by the
//! AES-256-CBC encrypted header, padded to the block size.
//!
//! Fields after the common prefix:
//! - vint: encryption version (0 = AES-256)
//! - vint: flags (0x0001 = password check present)
//! - u8: log2 of the PBKDF2 iteration count
//! - 16 bytes: salt
//! - 8 bytes check value + 4 bytes check sum, if flags & 0x0001

use crate::checksum::password_check_intact;
use crate::error::{RarError, Result};
use crate::parsing::RecordCursor;
use crate::record::{EncryptionHeader, PasswordCheck};

pub const CRYPT_VERSION: u64 = 0;
pub const CRYPT_PSWCHECK: u64 = 0x0001;
/// Highest accepted iteration count exponent.
pub const CRYPT5_KDF_LG2_COUNT_MAX: u8 = 24;

pub struct Rar5EncryptionHeaderParser;

impl Rar5EncryptionHeaderParser {
    pub fn parse(fields: &mut RecordCursor<'_>) -> Result<EncryptionHeader> {
        let version = fields.read_varint()?;
        if version != CRYPT_VERSION {
            return Err(RarError::UnsupportedEncryption {
                version,
                lg2_count: 0,
            });
        }
        let flags = fields.read_varint()?;
        let lg2_count = fields.read_u8()?;
        if lg2_count > CRYPT5_KDF_LG2_COUNT_MAX {
            return Err(RarError::UnsupportedEncryption { version, lg2_count });
        }
        let salt = fields.read_array()?;

        let check = if flags & CRYPT_PSWCHECK != 0 {
            let value = fields.read_array()?;
            let checksum = fields.read_array()?;
            password_check_intact(&value, &checksum).then_some(PasswordCheck { value, checksum })
        } else {
            None
        };

        Ok(EncryptionHeader {
            version,
            lg2_count,
            salt,
            check,
            password_verified: None,
        })
    }
}
