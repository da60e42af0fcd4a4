use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{EncodingDescriptor, StreamConstraints};
use super::error::JournalError;

/// Configuration for the voice-journal pipeline.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Constraints for the recording stream (default: echo cancellation and
    /// noise suppression on, 44.1 kHz).
    pub constraints: StreamConstraints,

    /// Encoding formats in order of preference. The first one the encoder
    /// provider supports wins.
    pub preferred_formats: Vec<String>,

    /// How often the encoder is asked to emit a chunk (default: 1000 ms).
    pub chunk_interval_ms: u64,

    /// Elapsed-time tick (default: 1000 ms). Artifact durations count ticks.
    pub tick_interval_ms: u64,

    /// Render loop period (default: 16 ms, ~60 frames per second).
    pub frame_interval_ms: u64,

    /// Analyser window size. Must be a power of two in 32..=32768.
    pub analyser_fft_size: usize,

    /// Persisted-store key holding the entry list.
    pub entries_key: String,

    /// Directory for artifact files, or None to keep artifacts in memory.
    pub artifact_directory: Option<PathBuf>,
}

impl JournalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.preferred_formats.is_empty() {
            return Err("at least one preferred format is required".into());
        }
        if self.chunk_interval_ms == 0 {
            return Err("chunk interval must be positive".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick interval must be positive".into());
        }
        if self.frame_interval_ms == 0 {
            return Err("frame interval must be positive".into());
        }
        let fft_size = self.analyser_fft_size;
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(format!("unsupported analyser fft size: {}", fft_size));
        }
        if self.entries_key.trim().is_empty() {
            return Err("entries key must not be empty".into());
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, JournalError> {
        let json = fs::read_to_string(path).map_err(|e| {
            JournalError::ConfigurationFailed(format!("failed to read config: {}", e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            JournalError::ConfigurationFailed(format!("failed to parse config: {}", e))
        })?;
        config.validate().map_err(JournalError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn format_preferences(&self) -> Vec<EncodingDescriptor> {
        self.preferred_formats.iter().map(EncodingDescriptor::new).collect()
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            constraints: StreamConstraints::default(),
            preferred_formats: vec![
                "audio/webm;codecs=opus".into(),
                "audio/webm".into(),
                "audio/ogg;codecs=opus".into(),
                "audio/mp4".into(),
                "audio/wav".into(),
            ],
            chunk_interval_ms: 1000,
            tick_interval_ms: 1000,
            frame_interval_ms: 16,
            analyser_fft_size: 2048,
            entries_key: "voice-journal-entries".into(),
            artifact_directory: None,
        }
    }
}
