//! Credential encryption
//!
//! Login-user passwords are stored only as cipher output. The service talks to
//! the [`Cipher`] trait; [`AesGcmCipher`] is the adapter wired up by the binary.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::{CoreError, CoreResult};

const NONCE_LEN: usize = 12;

pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> CoreResult<String>;
    fn decrypt(&self, ciphertext: &str) -> CoreResult<String>;
}

/// AES-256-GCM with a random nonce prepended; output is base64 text.
pub struct AesGcmCipher {
    key: [u8; 32],
}

impl AesGcmCipher {
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_base64_key(encoded: &str) -> CoreResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::validation(format!("Encryption key is not base64: {}", e)))?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            CoreError::validation(format!(
                "Encryption key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_key(key))
    }

    /// Fresh random key, for development servers started without one.
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(key.as_slice());
        Self::from_key(bytes)
    }

    fn cipher(&self) -> CoreResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::internal(format!("Failed to create cipher: {}", e)))
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> CoreResult<String> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CoreError::internal(format!("Encryption failed: {}", e)))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> CoreResult<String> {
        let sealed = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| CoreError::internal(format!("Ciphertext is not base64: {}", e)))?;
        if sealed.len() < NONCE_LEN {
            return Err(CoreError::internal("Ciphertext too short"));
        }

        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|e| CoreError::internal(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| CoreError::internal(format!("Decrypted password is not UTF-8: {}", e)))
    }
}
