use std::collections::HashMap;

/// Chunk encryption interface for artifact files at rest.
///
/// Sealed chunk format:
/// ```text
/// [12-byte nonce] [ciphertext] [16-byte GCM authentication tag]
/// ```
pub trait CaptureEncryptor: Send + Sync {
    /// Encrypt one chunk. Returns `nonce || ciphertext || tag`.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Reverse `encrypt`.
    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, String>;

    /// Metadata about the encryption key (e.g., key ID).
    fn key_metadata(&self) -> HashMap<String, String>;

    /// Algorithm identifier (e.g., "AES-256-GCM").
    fn algorithm(&self) -> &str;

    fn clone_box(&self) -> Box<dyn CaptureEncryptor>;
}

impl Clone for Box<dyn CaptureEncryptor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
