//! RAR5 header encryption.
//!
//! RAR5 uses:
//! - AES-256-CBC for encryption
//! - PBKDF2-HMAC-SHA256 for key derivation, 2^lg2_count iterations
//! - 16-byte salt from the archive encryption header
//! - 16-byte IV stored in front of every encrypted header
//! - 8-byte password check value for fast verification

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::checksum::SIZE_PSWCHECK;
use crate::key::{CryptoError, HeaderCipher};
use crate::parsing::rar5::encryption_header::CRYPT5_KDF_LG2_COUNT_MAX;
use crate::parsing::rar5::IV_SIZE;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Extra PBKDF2 iterations for the password check value.
const PSWCHECK_EXTRA_ROUNDS: u32 = 32;

/// Keys derived from a password for one set of KDF parameters.
#[derive(Clone)]
pub struct Rar5Keys {
    key: [u8; 32],
    password_check: [u8; SIZE_PSWCHECK],
}

impl Rar5Keys {
    /// Derive the AES-256 key and the password check value. `None` for an
    /// iteration count above the format maximum.
    pub fn derive(password: &str, salt: &[u8; 16], lg2_count: u8) -> Option<Self> {
        if lg2_count > CRYPT5_KDF_LG2_COUNT_MAX {
            return None;
        }
        let rounds = 1u32 << lg2_count;

        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);

        let mut check_value = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt,
            rounds + PSWCHECK_EXTRA_ROUNDS,
            &mut check_value,
        );
        let mut password_check = [0u8; SIZE_PSWCHECK];
        for (i, byte) in check_value.iter().enumerate() {
            password_check[i % SIZE_PSWCHECK] ^= byte;
        }

        Some(Self {
            key,
            password_check,
        })
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn password_check(&self) -> [u8; SIZE_PSWCHECK] {
        self.password_check
    }
}

impl std::fmt::Debug for Rar5Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rar5Keys").finish_non_exhaustive()
    }
}

/// Header cipher for RAR5 archives.
pub struct Rar5Cipher {
    key: [u8; 32],
}

impl Rar5Cipher {
    pub fn new(keys: &Rar5Keys) -> Self {
        Self { key: keys.key }
    }
}

impl HeaderCipher for Rar5Cipher {
    fn decrypt(&mut self, init: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
        if init.len() != IV_SIZE {
            return Err(CryptoError::InvalidInit(init.len()));
        }
        if data.len() % 16 != 0 {
            return Err(CryptoError::DecryptionFailed);
        }
        Aes256CbcDec::new_from_slices(&self.key, init)
            .map_err(|_| CryptoError::DecryptionFailed)?
            .decrypt_padded_mut::<NoPadding>(data)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    #[test]
    fn test_derive_keys() {
        let salt = [0u8; 16];
        let keys = Rar5Keys::derive("password", &salt, 4).unwrap();
        let again = Rar5Keys::derive("password", &salt, 4).unwrap();
        assert_eq!(keys.key, again.key);
        assert_eq!(keys.password_check(), again.password_check());

        let other = Rar5Keys::derive("different", &salt, 4).unwrap();
        assert_ne!(keys.key, other.key);
        assert_ne!(keys.password_check(), other.password_check());

        assert!(Rar5Keys::derive("password", &salt, 25).is_none());
    }

    #[test]
    fn test_check_value_is_folded_pbkdf2() {
        let salt = [9u8; 16];
        let keys = Rar5Keys::derive("pw", &salt, 3).unwrap();

        let mut full = [0u8; 32];
        pbkdf2_hmac::<Sha256>(b"pw", &salt, 8 + 32, &mut full);
        let mut expected = [0u8; 8];
        for (i, byte) in full.iter().enumerate() {
            expected[i % 8] ^= byte;
        }
        assert_eq!(keys.password_check(), expected);
    }

    #[test]
    fn test_decrypt_round_trip() {
        let keys = Rar5Keys::derive("pw", &[1; 16], 2).unwrap();
        let iv = [0x42u8; 16];
        let plain: Vec<u8> = (0u8..32).collect();
        let mut data = plain.clone();
        Aes256CbcEnc::new_from_slices(keys.key(), &iv)
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(&mut data, 32)
            .unwrap();

        let mut cipher = Rar5Cipher::new(&keys);
        cipher.decrypt(&iv, &mut data).unwrap();
        assert_eq!(data, plain);

        assert_eq!(
            cipher.decrypt(&[0; 8], &mut data),
            Err(CryptoError::InvalidInit(8))
        );
    }
}
