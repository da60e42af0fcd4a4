use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::artifact::{AudioArtifact, ArtifactMetadata};
use crate::models::audio_models::EncodingDescriptor;
use crate::models::entry::ArtifactRef;
use crate::models::error::{JournalError, PersistenceError, PlaybackError};
use crate::storage::artifact_file::{self, ArtifactFileWriter};
use crate::storage::metadata;
use crate::traits::encryptor::CaptureEncryptor;

/// A transient, playable view of a stored artifact.
///
/// Cached by the vault until the artifact reference is released.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableSource {
    pub artifact_ref: ArtifactRef,
    /// `blob:` style locator, unique per materialization.
    pub url: String,
    pub encoding: EncodingDescriptor,
    pub duration_secs: f64,
    pub bytes: Arc<[u8]>,
}

enum Backing {
    Memory,
    Directory {
        directory: PathBuf,
        encryptor: Option<Box<dyn CaptureEncryptor>>,
    },
}

enum Stored {
    InMemory(AudioArtifact),
    OnDisk(ArtifactMetadata),
}

#[derive(Default)]
struct VaultInner {
    live: HashMap<ArtifactRef, Stored>,
    transient: HashMap<ArtifactRef, PlayableSource>,
    released_total: u64,
}

/// Owner of the bytes behind every artifact reference.
///
/// A reference is live from `store`/`adopt` until `release`/`discard`/
/// `release_all`, and is released exactly once. `release_all` runs on drop.
pub struct ArtifactVault {
    backing: Backing,
    inner: Mutex<VaultInner>,
}

impl ArtifactVault {
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory,
            inner: Mutex::new(VaultInner::default()),
        }
    }

    /// Keep artifacts as framed files under `directory`, encrypted when an
    /// encryptor is supplied.
    pub fn in_directory(
        directory: PathBuf,
        encryptor: Option<Box<dyn CaptureEncryptor>>,
    ) -> Result<Self, JournalError> {
        fs::create_dir_all(&directory).map_err(|e| {
            PersistenceError::WriteFailure(format!("failed to create artifact directory: {}", e))
        })?;
        Ok(Self {
            backing: Backing::Directory { directory, encryptor },
            inner: Mutex::new(VaultInner::default()),
        })
    }

    /// Take ownership of an artifact and hand back its reference.
    pub fn store(&self, artifact: AudioArtifact) -> Result<ArtifactRef, JournalError> {
        let artifact_ref = ArtifactRef::generate();
        let stored = match &self.backing {
            Backing::Memory => Stored::InMemory(artifact),
            Backing::Directory { directory, encryptor } => {
                let path = artifact_path(directory, &artifact_ref).ok_or_else(|| {
                    PersistenceError::WriteFailure(format!(
                        "malformed artifact reference {}",
                        artifact_ref
                    ))
                })?;
                let writer = ArtifactFileWriter::new(path.clone(), encryptor.clone());
                let written = writer.write(&artifact).and_then(|meta| {
                    metadata::write_metadata(&meta, &path)?;
                    Ok(meta)
                });
                match written {
                    Ok(meta) => Stored::OnDisk(meta),
                    Err(e) => {
                        fs::remove_file(&path).ok();
                        fs::remove_file(metadata::metadata_path(&path)).ok();
                        return Err(e);
                    }
                }
            }
        };

        self.inner.lock().live.insert(artifact_ref.clone(), stored);
        log::debug!("Stored artifact {}", artifact_ref);
        Ok(artifact_ref)
    }

    /// Re-register a reference persisted by an earlier process.
    ///
    /// Returns false when the vault has no bytes for it (always the case for
    /// an in-memory vault) or it is already live.
    pub fn adopt(&self, artifact_ref: &ArtifactRef) -> bool {
        let Backing::Directory { directory, .. } = &self.backing else {
            return false;
        };
        if self.inner.lock().live.contains_key(artifact_ref) {
            return false;
        }

        let Some(path) = artifact_path(directory, artifact_ref) else {
            log::warn!(
                "Refusing to adopt malformed artifact reference {:?}",
                artifact_ref.as_str()
            );
            return false;
        };
        if !path.exists() {
            return false;
        }
        match metadata::read_metadata(&path) {
            Ok(meta) => {
                self.inner
                    .lock()
                    .live
                    .insert(artifact_ref.clone(), Stored::OnDisk(meta));
                true
            }
            Err(e) => {
                log::warn!("Cannot adopt artifact {}: {}", artifact_ref, e);
                false
            }
        }
    }

    /// Resolve a playable handle, creating and caching one if needed.
    pub fn materialize(&self, artifact_ref: &ArtifactRef) -> Result<PlayableSource, JournalError> {
        {
            let inner = self.inner.lock();
            if let Some(source) = inner.transient.get(artifact_ref) {
                return Ok(source.clone());
            }
        }

        let artifact = self.load(artifact_ref)?;
        let source = PlayableSource {
            artifact_ref: artifact_ref.clone(),
            url: format!("blob:voice-journal/{}", uuid::Uuid::new_v4()),
            encoding: artifact.encoding().clone(),
            duration_secs: artifact.duration_secs(),
            bytes: artifact.shared_bytes(),
        };

        let mut inner = self.inner.lock();
        if !inner.live.contains_key(artifact_ref) {
            return Err(unavailable(artifact_ref).into());
        }
        Ok(inner
            .transient
            .entry(artifact_ref.clone())
            .or_insert(source)
            .clone())
    }

    /// Load the full artifact behind a live reference.
    pub fn load(&self, artifact_ref: &ArtifactRef) -> Result<AudioArtifact, JournalError> {
        let meta = {
            let inner = self.inner.lock();
            match inner.live.get(artifact_ref) {
                Some(Stored::InMemory(artifact)) => return Ok(artifact.clone()),
                Some(Stored::OnDisk(meta)) => meta.clone(),
                None => return Err(unavailable(artifact_ref).into()),
            }
        };

        let Backing::Directory { directory, encryptor } = &self.backing else {
            return Err(unavailable(artifact_ref).into());
        };
        let path = artifact_path(directory, artifact_ref).ok_or_else(|| unavailable(artifact_ref))?;
        artifact_file::read_artifact(&path, &meta, encryptor.as_deref())
    }

    /// Revoke the transient handle and unregister the reference. Persisted
    /// bytes stay on disk. Returns false if it was not live.
    pub fn release(&self, artifact_ref: &ArtifactRef) -> bool {
        let mut inner = self.inner.lock();
        inner.transient.remove(artifact_ref);
        if inner.live.remove(artifact_ref).is_some() {
            inner.released_total += 1;
            true
        } else {
            false
        }
    }

    /// Release the reference and delete its persisted bytes.
    ///
    /// Files are deleted even when the reference is no longer live, so an
    /// entry whose artifact was never adopted still takes its bytes with it.
    /// Returns whether the reference was live.
    pub fn discard(&self, artifact_ref: &ArtifactRef) -> bool {
        let was_live = self.release(artifact_ref);
        if let Some(path) = self.file_for(artifact_ref) {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("Deleted artifact file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to delete artifact file {}: {}", path.display(), e),
            }
            fs::remove_file(metadata::metadata_path(&path)).ok();
        }
        if was_live {
            log::debug!("Discarded artifact {}", artifact_ref);
        }
        was_live
    }

    /// Release every live reference. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.transient.clear();
        let count = inner.live.len();
        inner.live.clear();
        inner.released_total += count as u64;
        count
    }

    fn file_for(&self, artifact_ref: &ArtifactRef) -> Option<PathBuf> {
        match &self.backing {
            Backing::Directory { directory, .. } => artifact_path(directory, artifact_ref),
            Backing::Memory => None,
        }
    }

    pub fn is_live(&self, artifact_ref: &ArtifactRef) -> bool {
        self.inner.lock().live.contains_key(artifact_ref)
    }

    /// Number of references not yet released.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Number of cached playable handles.
    pub fn transient_count(&self) -> usize {
        self.inner.lock().transient.len()
    }

    /// Releases over the vault's lifetime.
    pub fn released_total(&self) -> u64 {
        self.inner.lock().released_total
    }
}

impl Drop for ArtifactVault {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            log::debug!("Released {} artifact references on teardown", released);
        }
    }
}

/// File backing `artifact_ref`, or None when the reference could name a
/// path outside `directory`.
fn artifact_path(directory: &Path, artifact_ref: &ArtifactRef) -> Option<PathBuf> {
    artifact_ref
        .is_well_formed()
        .then(|| directory.join(format!("{}.vja", artifact_ref)))
}

fn unavailable(artifact_ref: &ArtifactRef) -> PlaybackError {
    PlaybackError::ResourceUnavailable(format!("artifact {} is not available", artifact_ref))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::storage::aes_encryptor::AesGcmEncryptor;

    fn artifact(bytes: &[u8]) -> AudioArtifact {
        AudioArtifact::new(bytes.to_vec(), EncodingDescriptor::new("audio/webm"), 2.0, Utc::now())
    }

    fn encrypted_vault(dir: &Path, key: [u8; 32]) -> ArtifactVault {
        let encryptor = AesGcmEncryptor::new(key, "k");
        ArtifactVault::in_directory(dir.to_path_buf(), Some(Box::new(encryptor))).unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("voice_journal_vault_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn store_materialize_release() {
        let vault = ArtifactVault::in_memory();
        let r = vault.store(artifact(b"abc")).unwrap();
        assert_eq!(vault.live_count(), 1);

        let source = vault.materialize(&r).unwrap();
        assert!(source.url.starts_with("blob:voice-journal/"));
        assert_eq!(&*source.bytes, b"abc");
        assert_eq!(vault.transient_count(), 1);

        // Cached until release.
        assert_eq!(vault.materialize(&r).unwrap().url, source.url);

        assert!(vault.release(&r));
        assert!(!vault.release(&r));
        assert_eq!(vault.live_count(), 0);
        assert_eq!(vault.transient_count(), 0);
        assert_eq!(vault.released_total(), 1);
    }

    #[test]
    fn released_reference_is_unavailable() {
        let vault = ArtifactVault::in_memory();
        let r = vault.store(artifact(b"abc")).unwrap();
        vault.discard(&r);

        let err = vault.materialize(&r).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::ResourceUnavailable(_))));
    }

    #[test]
    fn release_all_counts_each_reference_once() {
        let vault = ArtifactVault::in_memory();
        let a = vault.store(artifact(b"a")).unwrap();
        vault.store(artifact(b"b")).unwrap();
        vault.release(&a);

        assert_eq!(vault.release_all(), 1);
        assert_eq!(vault.released_total(), 2);
        assert_eq!(vault.live_count(), 0);
    }

    #[test]
    fn directory_vault_encrypts_and_survives_restart() {
        let dir = temp_dir();
        let key = [3u8; 32];

        let r = {
            let vault = encrypted_vault(&dir, key);
            let r = vault.store(artifact(b"hello journal")).unwrap();
            let raw = fs::read(dir.join(format!("{}.vja", r))).unwrap();
            assert!(!raw.windows(5).any(|w| w == b"hello"));
            r
        };

        // Dropping the vault released the reference but kept the file.
        let vault = encrypted_vault(&dir, key);
        assert!(!vault.is_live(&r));
        assert!(vault.adopt(&r));
        assert!(!vault.adopt(&r));
        assert_eq!(&*vault.materialize(&r).unwrap().bytes, b"hello journal");

        assert!(vault.discard(&r));
        assert!(!dir.join(format!("{}.vja", r)).exists());
        assert!(!vault.adopt(&r));

        fs::remove_dir_all(&dir).ok();
    }

    struct RefusingEncryptor;

    impl CaptureEncryptor for RefusingEncryptor {
        fn encrypt(&self, _data: &[u8]) -> Result<Vec<u8>, String> {
            Err("key unavailable".into())
        }

        fn decrypt(&self, _sealed: &[u8]) -> Result<Vec<u8>, String> {
            Err("key unavailable".into())
        }

        fn key_metadata(&self) -> std::collections::HashMap<String, String> {
            Default::default()
        }

        fn algorithm(&self) -> &str {
            "REFUSING"
        }

        fn clone_box(&self) -> Box<dyn CaptureEncryptor> {
            Box::new(RefusingEncryptor)
        }
    }

    #[test]
    fn discard_deletes_files_of_released_refs() {
        let dir = temp_dir();
        let vault = ArtifactVault::in_directory(dir.clone(), None).unwrap();
        let r = vault.store(artifact(b"orphan")).unwrap();
        let path = dir.join(format!("{}.vja", r));
        assert_eq!(vault.release_all(), 1);

        assert!(!vault.discard(&r));
        assert!(!path.exists());
        assert!(!metadata::metadata_path(&path).exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = temp_dir();
        let vault =
            ArtifactVault::in_directory(dir.clone(), Some(Box::new(RefusingEncryptor))).unwrap();

        let err = vault.store(artifact(b"never written")).unwrap_err();
        assert!(matches!(err, JournalError::EncryptionFailed(_)));
        assert_eq!(vault.live_count(), 0);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_sidecar_size_fails_materialize() {
        let dir = temp_dir();
        let r = ArtifactVault::in_directory(dir.clone(), None)
            .unwrap()
            .store(artifact(b"sidecar"))
            .unwrap();

        let sidecar = metadata::metadata_path(&dir.join(format!("{}.vja", r)));
        let raw = fs::read_to_string(&sidecar).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        json["size_bytes"] = serde_json::json!(u64::MAX / 2);
        fs::write(&sidecar, json.to_string()).unwrap();

        let vault = ArtifactVault::in_directory(dir.clone(), None).unwrap();
        assert!(vault.adopt(&r));
        let err = vault.materialize(&r).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::DecodeFailure(_))));
        assert_eq!(vault.transient_count(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_refs_never_touch_files_outside_the_vault() {
        let root = temp_dir();
        let dir = root.join("vault");
        fs::create_dir_all(&root).unwrap();
        let outside = root.join("outside.vja");
        fs::write(&outside, b"not ours").unwrap();

        let absolute = outside.with_extension("");
        let vault = ArtifactVault::in_directory(dir, None).unwrap();
        for raw in ["../outside", absolute.to_str().unwrap()] {
            let r = ArtifactRef::from(raw);
            assert!(!vault.adopt(&r));
            assert!(!vault.discard(&r));
            assert!(vault.materialize(&r).is_err());
        }
        assert!(outside.exists());

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn memory_vault_cannot_adopt() {
        let vault = ArtifactVault::in_memory();
        assert!(!vault.adopt(&ArtifactRef::from("missing")));
    }
}
