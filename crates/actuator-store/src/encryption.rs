//! AES-256-GCM encryption for credential material at rest.

use actuator_core::EncryptedBlob;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

const NONCE_LEN: usize = 12;

/// Symmetric cipher bound to one 32-byte key.
#[derive(Clone)]
pub struct Crypto {
    key: [u8; 32],
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypto").field("key", &"<redacted>").finish()
    }
}

impl Crypto {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the key as SHA-256 of the passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt with a fresh random 96-bit nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> StoreResult<EncryptedBlob> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StoreError::Encryption(e.to_string()))?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| StoreError::Encryption("AES-GCM encryption failed".to_string()))?;
        Ok(EncryptedBlob {
            ciphertext: general_purpose::STANDARD.encode(ciphertext),
            nonce: general_purpose::STANDARD.encode(nonce_bytes),
        })
    }

    pub fn decrypt(&self, blob: &EncryptedBlob) -> StoreResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StoreError::Decryption(e.to_string()))?;
        let nonce_bytes = general_purpose::STANDARD
            .decode(&blob.nonce)
            .map_err(|e| StoreError::Decryption(format!("invalid nonce encoding: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::Decryption(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }
        let ciphertext = general_purpose::STANDARD
            .decode(&blob.ciphertext)
            .map_err(|e| StoreError::Decryption(format!("invalid ciphertext encoding: {}", e)))?;
        // Authentication tag mismatch covers both wrong key and tampering
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| StoreError::Decryption("authentication failed".to_string()))
    }

    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> StoreResult<EncryptedBlob> {
        let plaintext = serde_json::to_vec(value)?;
        self.encrypt(&plaintext)
    }

    pub fn decrypt_json<T: DeserializeOwned>(&self, blob: &EncryptedBlob) -> StoreResult<T> {
        let plaintext = self.decrypt(blob)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
