use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::traits::encryptor::CaptureEncryptor;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256-GCM frame encryptor for artifact files.
///
/// Sealed format: `nonce (12B) || ciphertext || tag (16B)`. The key is
/// supplied by the host's key management; only its ID is recorded.
pub struct AesGcmEncryptor {
    key_bytes: [u8; 32],
    key_id: String,
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    pub fn new(key_bytes: [u8; 32], key_id: impl Into<String>) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            key_bytes,
            key_id: key_id.into(),
            cipher: Aes256Gcm::new(key),
        }
    }
}

impl CaptureEncryptor for AesGcmEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, data)
            .map_err(|e| format!("AES-GCM encryption failed: {}", e))?;

        // aes-gcm appends the tag to the ciphertext; prepend the nonce.
        let mut combined = Vec::with_capacity(nonce.len() + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, String> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(format!("sealed box too short: {} bytes", sealed.len()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| format!("AES-GCM decryption failed: {}", e))
    }

    fn key_metadata(&self) -> HashMap<String, String> {
        let mut meta = HashMap::new();
        meta.insert("keyId".to_string(), self.key_id.clone());
        meta.insert("algorithm".to_string(), self.algorithm().to_string());
        meta
    }

    fn algorithm(&self) -> &str {
        "AES-256-GCM"
    }

    fn clone_box(&self) -> Box<dyn CaptureEncryptor> {
        Box::new(AesGcmEncryptor::new(self.key_bytes, self.key_id.clone()))
    }
}
