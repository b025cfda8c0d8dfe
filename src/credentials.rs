//! Mailbox password decryption.
//!
//! Account passwords are stored as hex-encoded AES-256-CBC ciphertext with a
//! per-row hex IV, encrypted under one process-wide 32-byte key supplied via
//! `MAIL_SECRET_KEY`. A decryption failure is never fatal: the account is
//! skipped for this run.

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::error::{IngestError, Result};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Turns stored ciphertext back into a plaintext password.
pub trait Decryptor {
    fn decrypt(&self, ciphertext_hex: &str, iv_hex: &str) -> Result<String>;
}

/// AES-256-CBC with PKCS#7 padding.
pub struct AesCbcDecryptor {
    key: [u8; 32],
}

impl std::fmt::Debug for AesCbcDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcDecryptor").finish_non_exhaustive()
    }
}

impl AesCbcDecryptor {
    /// Build a decryptor from the raw key string.
    ///
    /// The key's UTF-8 bytes are used directly and must be exactly 32 bytes.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let key: [u8; 32] = secret.as_bytes().try_into().map_err(|_| {
            IngestError::Config(format!(
                "MAIL_SECRET_KEY must be 32 bytes, got {}",
                secret.len()
            ))
        })?;
        Ok(Self { key })
    }
}

impl Decryptor for AesCbcDecryptor {
    fn decrypt(&self, ciphertext_hex: &str, iv_hex: &str) -> Result<String> {
        let iv = hex::decode(iv_hex.trim())
            .map_err(|e| IngestError::Credential(format!("bad iv: {e}")))?;
        let ciphertext = hex::decode(ciphertext_hex.trim())
            .map_err(|e| IngestError::Credential(format!("bad ciphertext: {e}")))?;

        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|e| IngestError::Credential(format!("bad iv length: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| IngestError::Credential("decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| IngestError::Credential("plaintext is not UTF-8".to_string()))
    }
}

#[cfg(test)]
pub mod test_support {
    use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    pub const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    /// Encrypt `plaintext` the same way stored passwords are, returning
    /// `(ciphertext_hex, iv_hex)`.
    pub fn encrypt(plaintext: &str, iv: [u8; 16]) -> (String, String) {
        let ct = Aes256CbcEnc::new_from_slices(TEST_KEY.as_bytes(), &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        (hex::encode(ct), hex::encode(iv))
    }
}
