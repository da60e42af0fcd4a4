use std::fs;
use std::path::{Path, PathBuf};

use crate::models::artifact::ArtifactMetadata;
use crate::models::error::PersistenceError;

/// Sidecar path for an artifact file: `{name}.metadata.json`.
pub fn metadata_path(artifact_path: &Path) -> PathBuf {
    artifact_path.with_extension("metadata.json")
}

/// Write artifact metadata as a JSON sidecar file.
pub fn write_metadata(
    metadata: &ArtifactMetadata,
    artifact_path: &Path,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(metadata).map_err(|e| {
        PersistenceError::WriteFailure(format!("failed to serialize metadata: {}", e))
    })?;
    fs::write(metadata_path(artifact_path), json)
        .map_err(|e| PersistenceError::WriteFailure(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read artifact metadata from a JSON sidecar file.
pub fn read_metadata(artifact_path: &Path) -> Result<ArtifactMetadata, PersistenceError> {
    let json = fs::read_to_string(metadata_path(artifact_path))
        .map_err(|e| PersistenceError::ReadFailure(format!("failed to read metadata: {}", e)))?;
    let metadata: ArtifactMetadata = serde_json::from_str(&json)
        .map_err(|e| PersistenceError::CorruptRecord(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}
