//! RAR 3.x/4.x header encryption.
//!
//! - AES-128-CBC
//! - Key and IV from 2^18 rounds of SHA-1 over password (UTF-16LE), salt
//!   and a 3-byte round counter
//! - 8-byte salt stored in front of every encrypted header
//! - No password verification (a wrong password produces garbage, which the
//!   decoder notices through the header checksum)

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use sha1::{Digest, Sha1};

use crate::key::{CryptoError, HeaderCipher};
use crate::parsing::rar4::SALT_SIZE;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const HASH_ROUNDS: u32 = 0x40000;
/// Derived keys kept per salt.
const KEY_CACHE_SIZE: usize = 4;

/// AES-128 key and IV derived from a password and salt.
#[derive(Clone, PartialEq, Eq)]
pub struct Rar4Key {
    key: [u8; 16],
    iv: [u8; 16],
}

impl Rar4Key {
    pub fn derive(password: &str, salt: &[u8; SALT_SIZE]) -> Self {
        let mut raw: Vec<u8> = password
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        raw.extend_from_slice(salt);

        let mut hasher = Sha1::new();
        let mut iv = [0u8; 16];
        for round in 0..HASH_ROUNDS {
            hasher.update(&raw);
            hasher.update([round as u8, (round >> 8) as u8, (round >> 16) as u8]);
            if round % (HASH_ROUNDS / 16) == 0 {
                let digest = hasher.clone().finalize();
                iv[(round / (HASH_ROUNDS / 16)) as usize] = digest[19];
            }
        }
        let digest = hasher.finalize();

        // The digest is read as big-endian words stored little-endian.
        let mut key = [0u8; 16];
        for (word, chunk) in key.chunks_exact_mut(4).zip(digest.chunks_exact(4)) {
            word.copy_from_slice(&[chunk[3], chunk[2], chunk[1], chunk[0]]);
        }

        Self { key, iv }
    }

    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    pub fn decrypt(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        if data.len() % 16 != 0 {
            return Err(CryptoError::DecryptionFailed);
        }
        Aes128CbcDec::new_from_slices(&self.key, &self.iv)
            .map_err(|_| CryptoError::DecryptionFailed)?
            .decrypt_padded_mut::<NoPadding>(data)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(())
    }
}

impl std::fmt::Debug for Rar4Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rar4Key").finish_non_exhaustive()
    }
}

/// Header cipher for RAR 3.x/4.x archives. Every header carries its own
/// salt, so keys are derived on demand and cached.
pub struct Rar4Cipher {
    password: String,
    cache: Vec<([u8; SALT_SIZE], Rar4Key)>,
}

impl Rar4Cipher {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_owned(),
            cache: Vec::with_capacity(KEY_CACHE_SIZE),
        }
    }

    fn key_for(&mut self, salt: [u8; SALT_SIZE]) -> &Rar4Key {
        let index = match self.cache.iter().position(|(cached, _)| *cached == salt) {
            Some(index) => index,
            None => {
                if self.cache.len() == KEY_CACHE_SIZE {
                    self.cache.remove(0);
                }
                self.cache.push((salt, Rar4Key::derive(&self.password, &salt)));
                self.cache.len() - 1
            }
        };
        &self.cache[index].1
    }

    pub(crate) fn cached_keys(&self) -> usize {
        self.cache.len()
    }
}

impl HeaderCipher for Rar4Cipher {
    fn decrypt(&mut self, init: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
        let salt: [u8; SALT_SIZE] = init
            .try_into()
            .map_err(|_| CryptoError::InvalidInit(init.len()))?;
        self.key_for(salt).decrypt(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    const SALT: [u8; 8] = [0x72, 0x8b, 0xe5, 0x8c, 0x22, 0x7f, 0x8d, 0xb4];

    #[test]
    fn test_derive_key() {
        let key = Rar4Key::derive("hello", &SALT);
        assert_eq!(key, Rar4Key::derive("hello", &SALT));
        assert_ne!(key, Rar4Key::derive("world", &SALT));
        assert_ne!(key, Rar4Key::derive("hello", &[0, 1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn test_decrypt_round_trip() {
        let key = Rar4Key::derive("hello", &SALT);
        let plain: Vec<u8> = (0u8..48).collect();
        let mut data = plain.clone();
        Aes128CbcEnc::new_from_slices(key.key(), key.iv())
            .unwrap()
            .encrypt_padded_mut::<NoPadding>(&mut data, 48)
            .unwrap();
        assert_ne!(data, plain);

        let mut cipher = Rar4Cipher::new("hello");
        cipher.decrypt(&SALT, &mut data).unwrap();
        assert_eq!(data, plain);
    }

    #[test]
    fn test_cipher_caches_per_salt() {
        let mut cipher = Rar4Cipher::new("pw");
        let mut block = [0u8; 16];
        cipher.decrypt(&SALT, &mut block).unwrap();
        cipher.decrypt(&SALT, &mut block).unwrap();
        assert_eq!(cipher.cached_keys(), 1);
    }

    #[test]
    fn test_bad_input() {
        let mut cipher = Rar4Cipher::new("pw");
        assert_eq!(
            cipher.decrypt(&[0; 16], &mut [0; 16]),
            Err(CryptoError::InvalidInit(16))
        );
        assert_eq!(
            cipher.decrypt(&SALT, &mut [0; 15]),
            Err(CryptoError::DecryptionFailed)
        );
    }
}
