//! Key material for encrypted headers.
//!
//! The decoder never derives keys itself. When it meets encrypted headers,
//! or is asked to verify per-entry passwords, it asks a [`KeyProvider`] for
//! [`KeyMaterial`]: a [`HeaderCipher`] able to decrypt header blocks and,
//! for RAR5, the 8-byte password check value derived for the archive's KDF
//! parameters.
//!
//! With the `crypto` feature, `crypto::PasswordKeyProvider` implements the
//! provider from a password.

use thiserror::Error;

/// Header generation a key is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatGeneration {
    /// RAR 1.5-4.x
    Legacy,
    /// RAR 5.0+
    Modern,
}

/// What the requested key will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKeyPurpose {
    /// Decrypting the headers that follow.
    HeaderDecryption,
    /// Checking an entry's password check value.
    EntryVerification,
}

/// Key derivation parameters stored in the archive (RAR5 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParameters<'a> {
    pub version: u64,
    /// Log2 of the PBKDF2 iteration count.
    pub lg2_count: u8,
    pub salt: &'a [u8; 16],
}

/// A request for key material.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    pub purpose: ArchiveKeyPurpose,
    pub generation: FormatGeneration,
    /// `None` for RAR 1.5-4.x, whose salt travels with each header and is
    /// handed to [`HeaderCipher::decrypt`] instead.
    pub kdf: Option<KdfParameters<'a>>,
}

/// Decrypts header blocks.
pub trait HeaderCipher: Send {
    /// Decrypt `data` in place. `init` is the per-record salt (8 bytes,
    /// RAR 1.5-4.x) or IV (16 bytes, RAR5) stored before the ciphertext.
    /// `data` is always a whole number of 16-byte blocks.
    fn decrypt(&mut self, init: &[u8], data: &mut [u8]) -> Result<(), CryptoError>;
}

/// Key material handed to the decoder.
#[derive(Default)]
pub struct KeyMaterial {
    pub cipher: Option<Box<dyn HeaderCipher>>,
    /// Password check value derived for the requested KDF parameters.
    pub password_check: Option<[u8; 8]>,
}

impl KeyMaterial {
    pub fn with_cipher(cipher: impl HeaderCipher + 'static) -> Self {
        Self {
            cipher: Some(Box::new(cipher)),
            password_check: None,
        }
    }

    pub fn password_check(mut self, check: [u8; 8]) -> Self {
        self.password_check = Some(check);
        self
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("cipher", &self.cipher.is_some())
            .field("password_check", &self.password_check.is_some())
            .finish()
    }
}

/// Source of key material.
pub trait KeyProvider: Send {
    /// Return key material for `request`, or `None` if no key is available.
    fn request_key(&mut self, request: &KeyRequest<'_>) -> Option<KeyMaterial>;
}

impl<F> KeyProvider for F
where
    F: FnMut(&KeyRequest<'_>) -> Option<KeyMaterial> + Send,
{
    fn request_key(&mut self, request: &KeyRequest<'_>) -> Option<KeyMaterial> {
        self(request)
    }
}

/// Error type for cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Wrong password provided
    #[error("Wrong password")]
    WrongPassword,
    /// Invalid salt or IV length
    #[error("Invalid salt or IV of {0} bytes")]
    InvalidInit(usize),
    /// Decryption failed
    #[error("Decryption failed")]
    DecryptionFailed,
    /// Unsupported encryption version
    #[error("Unsupported encryption version: {0}")]
    UnsupportedVersion(u64),
}

#[cfg(test)]
pub(crate) mod test_cipher {
    use super::*;

    /// XOR "cipher" keyed by one byte and the salt/IV, for exercising the
    /// decoder without real cryptography.
    #[derive(Debug, Clone, Copy)]
    pub struct XorCipher(pub u8);

    impl XorCipher {
        pub fn apply(&self, init: &[u8], data: &mut [u8]) {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte ^= self.0 ^ init[i % init.len()];
            }
        }
    }

    impl HeaderCipher for XorCipher {
        fn decrypt(&mut self, init: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
            if init.is_empty() {
                return Err(CryptoError::InvalidInit(0));
            }
            if data.len() % 16 != 0 {
                return Err(CryptoError::DecryptionFailed);
            }
            self.apply(init, data);
            Ok(())
        }
    }
}
