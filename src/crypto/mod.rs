//! Password-based key provider for encrypted archive headers.
//!
//! RAR5 uses AES-256-CBC with PBKDF2-HMAC-SHA256 key derivation and a
//! password check value. RAR 3.x/4.x uses AES-128-CBC with a SHA-1 based
//! KDF and no check value.
//!
//! ```rust,ignore
//! use rar_headers::{crypto::PasswordKeyProvider, HeaderDecoder};
//!
//! let decoder = HeaderDecoder::new(file)?
//!     .with_key_provider(PasswordKeyProvider::new("secret"));
//! ```

mod rar4;
mod rar5;

pub use rar4::{Rar4Cipher, Rar4Key};
pub use rar5::{Rar5Cipher, Rar5Keys};

use tracing::debug;

use crate::key::{ArchiveKeyPurpose, FormatGeneration, KeyMaterial, KeyProvider, KeyRequest};
use crate::parsing::rar5::encryption_header::CRYPT_VERSION;

/// Derives header keys and password check values from one password.
pub struct PasswordKeyProvider {
    password: String,
}

impl PasswordKeyProvider {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for PasswordKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordKeyProvider").finish_non_exhaustive()
    }
}

impl KeyProvider for PasswordKeyProvider {
    fn request_key(&mut self, request: &KeyRequest<'_>) -> Option<KeyMaterial> {
        match (request.generation, request.purpose) {
            (FormatGeneration::Legacy, ArchiveKeyPurpose::HeaderDecryption) => {
                Some(KeyMaterial::with_cipher(Rar4Cipher::new(&self.password)))
            }
            (FormatGeneration::Legacy, ArchiveKeyPurpose::EntryVerification) => None,
            (FormatGeneration::Modern, purpose) => {
                let kdf = request.kdf?;
                if kdf.version != CRYPT_VERSION {
                    debug!(version = kdf.version, "unknown encryption version");
                    return None;
                }
                let keys = Rar5Keys::derive(&self.password, kdf.salt, kdf.lg2_count)?;
                let material = match purpose {
                    ArchiveKeyPurpose::HeaderDecryption => {
                        KeyMaterial::with_cipher(Rar5Cipher::new(&keys))
                    }
                    ArchiveKeyPurpose::EntryVerification => KeyMaterial::default(),
                };
                Some(material.password_check(keys.password_check()))
            }
        }
    }
}
