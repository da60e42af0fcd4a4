//! # voice-journal-core
//!
//! Audio pipeline for a voice journal: microphone permission, recording
//! sessions, a live waveform visualizer, playback of saved entries and
//! persistence of entries with their audio.
//!
//! The host supplies capture, encoding, audio-graph, drawing and playback
//! capabilities through the provider traits and drives time through a
//! `Scheduler`. The `sim` module (behind the `sim` feature) has in-process
//! providers for tests and headless hosts.
//!
//! ## Architecture
//!
//! ```text
//! voice-journal-core (this crate)
//! ├── traits/       ← CaptureProvider, EncoderProvider, AudioGraphProvider,
//! │                   PlaybackProvider, PersistedStore, Transcriber,
//! │                   CaptureDelegate, PlaybackDelegate, CaptureEncryptor
//! ├── models/       ← JournalError, CaptureState, JournalConfig, AudioArtifact,
//! │                   VoiceEntry, etc.
//! ├── processing/   ← waveform geometry and levels, mood/tag heuristics
//! ├── session/      ← PermissionGate, CaptureSessionManager, AudioVisualizer,
//! │                   PlaybackController, Scheduler
//! ├── storage/      ← ArtifactVault, EntryStore, framed artifact files, metadata,
//! │                   key-value stores
//! ├── journal       ← VoiceJournal facade
//! └── sim           ← simulated providers (feature `sim`)
//! ```

pub mod journal;
pub mod models;
pub mod processing;
pub mod session;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use journal::{JournalSnapshot, Providers, VoiceJournal};
pub use models::artifact::{ArtifactMetadata, AudioArtifact};
pub use models::audio_models::{
    AudioSource, EncodingDescriptor, SourceMode, StreamConstraints, WaveformLevels,
};
pub use models::config::JournalConfig;
pub use models::entry::{ArtifactRef, EntryPatch, Mood, NewEntry, VoiceEntry};
pub use models::error::{
    DeviceError, EncodingError, JournalError, PermissionError, PersistenceError, PlaybackError,
};
pub use models::permission::{PermissionStatus, SupportReport};
pub use models::state::CaptureState;
pub use session::capture::{CaptureSessionManager, CaptureSnapshot};
pub use session::permission_gate::PermissionGate;
pub use session::playback::{PlaybackController, PlaybackOutcome, PlaybackSnapshot};
pub use session::scheduler::{ManualScheduler, Scheduler, TimerId};
pub use session::visualizer::AudioVisualizer;
pub use storage::aes_encryptor::AesGcmEncryptor;
pub use storage::artifact_vault::{ArtifactVault, PlayableSource};
pub use storage::entry_store::EntryStore;
pub use storage::persisted::{FileStore, MemoryStore};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_provider::{CaptureProvider, MediaStream};
pub use traits::encryptor::CaptureEncryptor;
pub use traits::playback_delegate::{PlaybackDelegate, PlaybackEnd};
pub use traits::transcriber::{StaticTranscriber, Transcriber};
