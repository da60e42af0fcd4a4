use serde::{Deserialize, Serialize};

/// An audio input device reported by the capture provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub label: String,
    pub is_default: bool,
}

/// Signal-processing constraints requested when opening a capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,

    /// Preferred sample rate in Hz. The device may deliver another rate.
    pub sample_rate: Option<u32>,

    /// Specific input device ID, or None for the system default.
    pub device_id: Option<String>,
}

impl StreamConstraints {
    /// Bare constraints for a permission check: no processing requested.
    pub fn access_check() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            sample_rate: None,
            device_id: None,
        }
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: Some(44100),
            device_id: None,
        }
    }
}

/// Container/codec description of encoded audio, e.g. `audio/webm;codecs=opus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingDescriptor {
    mime_type: String,
}

impl EncodingDescriptor {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The container part without codec parameters (`audio/webm`).
    pub fn container(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

impl std::fmt::Display for EncodingDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.mime_type)
    }
}

/// Which kind of source a visualizer session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Capture,
    Playback,
}

/// Waveform level metering (RMS and peak, 0.0–1.0) from the latest frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveformLevels {
    pub level: f32,
    pub peak: f32,
}

/// One vertex of a rendered waveform trace, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavePoint {
    pub x: f32,
    pub y: f32,
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub chunks_received: u64,
    pub bytes_received: u64,
    pub ticks: u64,
    pub sessions_started: u64,
    pub sessions_aborted: u64,
}
