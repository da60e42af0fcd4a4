use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::audio_models::EncodingDescriptor;

/// The encoded result of a completed capture session.
///
/// Immutable: the bytes are shared behind an `Arc<[u8]>` and no accessor
/// hands out mutable access.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    bytes: Arc<[u8]>,
    encoding: EncodingDescriptor,
    duration_secs: f64,
    created_at: DateTime<Utc>,
    checksum: String,
}

impl AudioArtifact {
    pub fn new(
        bytes: Vec<u8>,
        encoding: EncodingDescriptor,
        duration_secs: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let checksum = sha256_hex(&bytes);
        Self {
            bytes: bytes.into(),
            encoding,
            duration_secs,
            created_at,
            checksum,
        }
    }

    /// Concatenate chunks in emission order into one artifact.
    pub fn from_chunks(
        chunks: Vec<Vec<u8>>,
        encoding: EncodingDescriptor,
        duration_secs: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk);
        }
        Self::new(bytes, encoding, duration_secs, created_at)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the encoded bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn encoding(&self) -> &EncodingDescriptor {
        &self.encoding
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// SHA-256 hex digest of the encoded bytes.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata {
            encoding: self.encoding.clone(),
            duration_secs: self.duration_secs,
            created_at: self.created_at,
            checksum: self.checksum.clone(),
            size_bytes: self.bytes.len() as u64,
            encryption_algorithm: None,
            encryption_key_id: None,
        }
    }
}

/// Metadata stored alongside a persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub encoding: EncodingDescriptor,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
    pub size_bytes: u64,
    pub encryption_algorithm: Option<String>,
    pub encryption_key_id: Option<String>,
}

/// Compute the SHA-256 hex digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
