use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::artifact::{sha256_hex, AudioArtifact, ArtifactMetadata};
use crate::models::error::{JournalError, PersistenceError, PlaybackError};
use crate::traits::encryptor::CaptureEncryptor;

/// Magic bytes opening every artifact file.
pub const ARTIFACT_MAGIC: &[u8; 4] = b"VJA1";

/// Plaintext bytes per frame.
pub const FRAME_SIZE: usize = 64 * 1024;

/// Framed artifact file writer with optional AES-256-GCM frame encryption.
///
/// ## File Format
///
/// ```text
/// [4-byte magic "VJA1"]
/// [Frame 1: 4-byte LE length | payload]
/// [Frame 2: ...]
/// ```
///
/// Payload is the raw encoded audio, or a sealed box
/// (`nonce || ciphertext || tag`) when an encryptor is configured.
pub struct ArtifactFileWriter {
    file_path: PathBuf,
    encryptor: Option<Box<dyn CaptureEncryptor>>,
}

impl ArtifactFileWriter {
    pub fn new(file_path: PathBuf, encryptor: Option<Box<dyn CaptureEncryptor>>) -> Self {
        Self { file_path, encryptor }
    }

    /// Write `artifact` and return the metadata to store next to it.
    pub fn write(&self, artifact: &AudioArtifact) -> Result<ArtifactMetadata, JournalError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::WriteFailure(format!("failed to create directory: {}", e))
            })?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| PersistenceError::WriteFailure(format!("failed to create file: {}", e)))?;
        let mut out = BufWriter::new(file);

        write_all(&mut out, ARTIFACT_MAGIC)?;
        for frame in artifact.bytes().chunks(FRAME_SIZE) {
            let payload = match self.encryptor {
                Some(ref encryptor) => encryptor.encrypt(frame).map_err(|e| {
                    JournalError::EncryptionFailed(format!("frame encryption failed: {}", e))
                })?,
                None => frame.to_vec(),
            };
            write_all(&mut out, &(payload.len() as u32).to_le_bytes())?;
            write_all(&mut out, &payload)?;
        }
        out.flush()
            .map_err(|e| PersistenceError::WriteFailure(e.to_string()))?;

        let mut metadata = artifact.metadata();
        if let Some(ref encryptor) = self.encryptor {
            metadata.encryption_algorithm = Some(encryptor.algorithm().to_string());
            metadata.encryption_key_id = encryptor.key_metadata().get("keyId").cloned();
        }
        Ok(metadata)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Read an artifact file back, decrypting frames and verifying the checksum.
///
/// A missing file is `ResourceUnavailable`; a malformed or tampered file is
/// `DecodeFailure`.
pub fn read_artifact(
    path: &Path,
    metadata: &ArtifactMetadata,
    encryptor: Option<&dyn CaptureEncryptor>,
) -> Result<AudioArtifact, JournalError> {
    let data = fs::read(path)
        .map_err(|e| PlaybackError::ResourceUnavailable(format!("{}: {}", path.display(), e)))?;

    if data.len() < ARTIFACT_MAGIC.len() || &data[..ARTIFACT_MAGIC.len()] != ARTIFACT_MAGIC {
        return Err(PlaybackError::DecodeFailure("not an artifact file".into()).into());
    }

    // Frames never expand on decode, so the file length bounds the output.
    let mut bytes = Vec::with_capacity(data.len());
    let mut offset = ARTIFACT_MAGIC.len();
    while offset < data.len() {
        let header = data
            .get(offset..offset + 4)
            .ok_or_else(|| PlaybackError::DecodeFailure("truncated frame header".into()))?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        offset += 4;

        let payload = data
            .get(offset..offset + len)
            .ok_or_else(|| PlaybackError::DecodeFailure("truncated frame".into()))?;
        offset += len;

        match (metadata.encryption_algorithm.is_some(), encryptor) {
            (true, Some(encryptor)) => {
                let plain = encryptor.decrypt(payload).map_err(|e| {
                    PlaybackError::DecodeFailure(format!("frame decryption failed: {}", e))
                })?;
                bytes.extend_from_slice(&plain);
            }
            (true, None) => {
                return Err(PlaybackError::DecodeFailure(
                    "artifact is encrypted but no key is configured".into(),
                )
                .into());
            }
            (false, _) => bytes.extend_from_slice(payload),
        }
    }

    if bytes.len() as u64 != metadata.size_bytes {
        return Err(PlaybackError::DecodeFailure(format!(
            "decoded {} bytes, metadata records {}",
            bytes.len(),
            metadata.size_bytes
        ))
        .into());
    }
    if sha256_hex(&bytes) != metadata.checksum {
        return Err(PlaybackError::DecodeFailure("checksum mismatch".into()).into());
    }

    Ok(AudioArtifact::new(
        bytes,
        metadata.encoding.clone(),
        metadata.duration_secs,
        metadata.created_at,
    ))
}

fn write_all(out: &mut impl Write, data: &[u8]) -> Result<(), JournalError> {
    out.write_all(data)
        .map_err(|e| PersistenceError::WriteFailure(format!("write failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::Utc;

    use crate::models::audio_models::EncodingDescriptor;

    /// Reversible test "encryption": fake nonce + bytes xor 0x5A + fake tag.
    struct XorEncryptor;

    impl CaptureEncryptor for XorEncryptor {
        fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String> {
            let mut result = vec![0xAA; 12];
            result.extend(data.iter().map(|b| b ^ 0x5A));
            result.extend_from_slice(&[0xBB; 16]);
            Ok(result)
        }

        fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, String> {
            if sealed.len() < 28 {
                return Err("sealed box too short".into());
            }
            Ok(sealed[12..sealed.len() - 16].iter().map(|b| b ^ 0x5A).collect())
        }

        fn key_metadata(&self) -> HashMap<String, String> {
            HashMap::from([("keyId".to_string(), "test-key".to_string())])
        }

        fn algorithm(&self) -> &str {
            "TEST-XOR"
        }

        fn clone_box(&self) -> Box<dyn CaptureEncryptor> {
            Box::new(XorEncryptor)
        }
    }

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("voice_journal_test_{}_{}", uuid::Uuid::new_v4(), name))
    }

    fn artifact(len: usize) -> AudioArtifact {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        AudioArtifact::new(bytes, EncodingDescriptor::new("audio/webm"), 3.0, Utc::now())
    }

    #[test]
    fn plain_file_layout() {
        let path = temp_file_path("plain.vja");
        let writer = ArtifactFileWriter::new(path.clone(), None);
        let metadata = writer.write(&artifact(16)).unwrap();
        assert_eq!(metadata.encryption_algorithm, None);

        let data = fs::read(&path).unwrap();
        assert_eq!(&data[0..4], ARTIFACT_MAGIC);
        assert_eq!(data.len(), 4 + 4 + 16);
        let frame_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(frame_len, 16);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn encrypted_round_trip_across_frames() {
        let path = temp_file_path("enc.vja");
        let original = artifact(FRAME_SIZE + 100);
        let writer = ArtifactFileWriter::new(path.clone(), Some(Box::new(XorEncryptor)));
        let metadata = writer.write(&original).unwrap();
        assert_eq!(metadata.encryption_algorithm.as_deref(), Some("TEST-XOR"));
        assert_eq!(metadata.encryption_key_id.as_deref(), Some("test-key"));

        // Two frames, each sealed with 28 bytes of overhead.
        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 4 + (4 + FRAME_SIZE + 28) + (4 + 100 + 28));

        let restored = read_artifact(&path, &metadata, Some(&XorEncryptor)).unwrap();
        assert_eq!(restored.bytes(), original.bytes());
        assert_eq!(restored.checksum(), original.checksum());
        assert_eq!(restored.created_at(), original.created_at());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn tampered_file_fails_checksum() {
        let path = temp_file_path("tampered.vja");
        let writer = ArtifactFileWriter::new(path.clone(), None);
        let metadata = writer.write(&artifact(32)).unwrap();

        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        fs::write(&path, data).unwrap();

        let err = read_artifact(&path, &metadata, None).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::DecodeFailure(_))));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn size_mismatch_with_metadata_is_rejected() {
        let path = temp_file_path("size.vja");
        let writer = ArtifactFileWriter::new(path.clone(), None);
        let mut metadata = writer.write(&artifact(32)).unwrap();
        metadata.size_bytes = u64::MAX / 2;

        let err = read_artifact(&path, &metadata, None).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::DecodeFailure(_))));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn encrypted_file_without_key_is_rejected() {
        let path = temp_file_path("nokey.vja");
        let writer = ArtifactFileWriter::new(path.clone(), Some(Box::new(XorEncryptor)));
        let metadata = writer.write(&artifact(8)).unwrap();

        let err = read_artifact(&path, &metadata, None).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::DecodeFailure(_))));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_unavailable() {
        let metadata = artifact(4).metadata();
        let err = read_artifact(&temp_file_path("missing.vja"), &metadata, None).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::ResourceUnavailable(_))));
    }
}
