//! Loading the raw bytes of one header.
//!
//! Codecs ask for the header a piece at a time (the fixed prefix first, then
//! the rest once its size is known). For encrypted headers the loader reads
//! the salt or IV stored in front of the header, then whole 16-byte cipher
//! blocks, and hands out plaintext.

use crate::cursor::ByteCursor;
use crate::error::{RarError, Result};
use crate::file_media::ByteSource;
use crate::key::{CryptoError, HeaderCipher};

/// AES block size used for header encryption.
pub const CRYPT_BLOCK_SIZE: usize = 16;

#[inline]
pub fn align16(size: u64) -> Option<u64> {
    size.checked_add(CRYPT_BLOCK_SIZE as u64 - 1)
        .map(|s| s & !(CRYPT_BLOCK_SIZE as u64 - 1))
}

struct Decryption<'a> {
    cipher: &'a mut dyn HeaderCipher,
    init: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Incremental reader of one header's bytes.
pub struct HeaderLoader<'a, S> {
    cursor: &'a mut ByteCursor<S>,
    decryption: Option<Decryption<'a>>,
    plain: Vec<u8>,
}

impl<'a, S: ByteSource> HeaderLoader<'a, S> {
    /// Loader for an unencrypted header starting at the cursor position.
    pub fn plain(cursor: &'a mut ByteCursor<S>) -> Self {
        Self {
            cursor,
            decryption: None,
            plain: Vec::new(),
        }
    }

    /// Loader for an encrypted header: `init_len` bytes of salt or IV, then
    /// ciphertext.
    pub fn encrypted(
        cursor: &'a mut ByteCursor<S>,
        cipher: &'a mut dyn HeaderCipher,
        init_len: usize,
    ) -> Result<Self> {
        let init = cursor.read_bytes(init_len)?;
        Ok(Self {
            cursor,
            decryption: Some(Decryption {
                cipher,
                init,
                ciphertext: Vec::new(),
            }),
            plain: Vec::new(),
        })
    }

    pub fn is_decrypting(&self) -> bool {
        self.decryption.is_some()
    }

    /// Bytes in front of the header proper.
    pub fn init_len(&self) -> usize {
        self.decryption.as_ref().map_or(0, |d| d.init.len())
    }

    /// Make at least `len` header bytes available and return everything
    /// loaded so far.
    pub fn fill(&mut self, len: usize) -> Result<&[u8]> {
        if self.plain.len() >= len {
            return Ok(&self.plain);
        }
        match &mut self.decryption {
            None => {
                let more = self.cursor.read_bytes(len - self.plain.len())?;
                self.plain.extend_from_slice(&more);
            }
            Some(dec) => {
                let wanted = len.div_ceil(CRYPT_BLOCK_SIZE) * CRYPT_BLOCK_SIZE;
                if dec.ciphertext.len() < wanted {
                    let more = self.cursor.read_bytes(wanted - dec.ciphertext.len())?;
                    dec.ciphertext.extend_from_slice(&more);
                }
                // CBC makes each block depend on the one before, so decrypt
                // from the start every time.
                let mut plain = dec.ciphertext.clone();
                dec.cipher
                    .decrypt(&dec.init, &mut plain)
                    .map_err(|err| match err {
                        CryptoError::InvalidInit(_) | CryptoError::UnsupportedVersion(_) => {
                            RarError::PasswordRequired
                        }
                        CryptoError::WrongPassword | CryptoError::DecryptionFailed => {
                            RarError::PasswordIncorrect
                        }
                    })?;
                self.plain = plain;
            }
        }
        Ok(&self.plain)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.plain
    }

    /// Bytes the header occupies in the stream, given its declared size.
    pub fn on_disk_size(&self, header_size: u64) -> Option<u64> {
        match &self.decryption {
            None => Some(header_size),
            Some(dec) => align16(header_size)?.checked_add(dec.init.len() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::test_cipher::XorCipher;
    use std::io::Cursor;

    #[test]
    fn test_align16() {
        assert_eq!(align16(0), Some(0));
        assert_eq!(align16(1), Some(16));
        assert_eq!(align16(16), Some(16));
        assert_eq!(align16(17), Some(32));
        assert_eq!(align16(u64::MAX), None);
    }

    #[test]
    fn test_plain_fill_is_incremental() {
        let mut cursor = ByteCursor::new(Cursor::new((0u8..20).collect::<Vec<_>>())).unwrap();
        let mut loader = HeaderLoader::plain(&mut cursor);
        assert_eq!(loader.fill(7).unwrap(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(loader.fill(4).unwrap().len(), 7);
        assert_eq!(loader.fill(10).unwrap().len(), 10);
        assert!(matches!(loader.fill(25), Err(RarError::Truncated { needed: 5 })));
        assert_eq!(loader.on_disk_size(10), Some(10));
        assert_eq!(cursor.tell(), 10);
    }

    #[test]
    fn test_encrypted_fill() {
        let salt = [9u8, 8, 7, 6, 5, 4, 3, 2];
        let plain: Vec<u8> = (100u8..132).collect();
        let mut ciphertext = plain.clone();
        XorCipher(0x42).apply(&salt, &mut ciphertext);

        let mut stream = salt.to_vec();
        stream.extend_from_slice(&ciphertext);
        let mut cursor = ByteCursor::new(Cursor::new(stream)).unwrap();
        let mut cipher = XorCipher(0x42);
        let mut loader = HeaderLoader::encrypted(&mut cursor, &mut cipher, 8).unwrap();

        // A 7-byte request pulls one whole block.
        assert_eq!(loader.fill(7).unwrap(), &plain[..16]);
        assert_eq!(loader.fill(20).unwrap(), &plain[..]);
        assert_eq!(loader.init_len(), 8);
        assert_eq!(loader.on_disk_size(20), Some(8 + 32));
        assert!(loader.is_decrypting());
    }
}
