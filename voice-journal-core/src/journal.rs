use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::artifact::AudioArtifact;
use crate::models::audio_models::{AudioSource, SourceMode, WaveformLevels};
use crate::models::config::JournalConfig;
use crate::models::entry::{EntryPatch, NewEntry, VoiceEntry};
use crate::models::error::JournalError;
use crate::models::permission::PermissionStatus;
use crate::processing::text_heuristics;
use crate::session::capture::{CaptureSessionManager, CaptureSnapshot};
use crate::session::permission_gate::PermissionGate;
use crate::session::playback::{PlaybackController, PlaybackOutcome, PlaybackSnapshot};
use crate::session::scheduler::Scheduler;
use crate::session::visualizer::AudioVisualizer;
use crate::storage::artifact_vault::ArtifactVault;
use crate::storage::entry_store::EntryStore;
use crate::traits::audio_graph::{AudioGraphProvider, DrawingSurface};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::encoder::EncoderProvider;
use crate::traits::encryptor::CaptureEncryptor;
use crate::traits::persisted_store::PersistedStore;
use crate::traits::playback_delegate::PlaybackDelegate;
use crate::traits::player::PlaybackProvider;
use crate::traits::transcriber::Transcriber;

/// Host capabilities the journal is built on.
pub struct Providers {
    pub capture: Arc<dyn CaptureProvider>,
    pub encoders: Arc<dyn EncoderProvider>,
    pub graphs: Arc<dyn AudioGraphProvider>,
    pub surface: Box<dyn DrawingSurface>,
    pub players: Arc<dyn PlaybackProvider>,
    pub store: Arc<dyn PersistedStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub scheduler: Arc<dyn Scheduler>,
    /// Encrypts artifact files when `artifact_directory` is configured.
    pub encryptor: Option<Box<dyn CaptureEncryptor>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalSnapshot {
    pub capture: CaptureSnapshot,
    pub playback: PlaybackSnapshot,
    pub permission: PermissionStatus,
    pub entry_count: usize,
    pub visualizer_mode: Option<SourceMode>,
    pub levels: WaveformLevels,
    pub live_artifacts: usize,
}

/// The voice-journal pipeline: record, save, list, play and delete entries.
///
/// Recording and playback share one visualizer and never run together.
/// Starting a recording stops playback first; playing is rejected while a
/// recording is active.
pub struct VoiceJournal {
    gate: Arc<PermissionGate>,
    visualizer: Arc<AudioVisualizer>,
    capture: CaptureSessionManager,
    playback: PlaybackController,
    vault: Arc<ArtifactVault>,
    entries: EntryStore,
    transcriber: Arc<dyn Transcriber>,
    shut_down: Mutex<bool>,
}

impl VoiceJournal {
    pub fn new(providers: Providers, config: JournalConfig) -> Result<Self, JournalError> {
        config.validate().map_err(JournalError::ConfigurationFailed)?;

        let vault = Arc::new(match &config.artifact_directory {
            Some(directory) => ArtifactVault::in_directory(directory.clone(), providers.encryptor)?,
            None => ArtifactVault::in_memory(),
        });
        let entries = EntryStore::open(
            providers.store,
            Arc::clone(&vault),
            config.entries_key.clone(),
        )?;

        let visualizer = Arc::new(AudioVisualizer::new(
            providers.graphs,
            Arc::clone(&providers.scheduler),
            providers.surface,
            config.analyser_fft_size,
            config.frame_interval(),
        ));
        let gate = Arc::new(PermissionGate::new(Arc::clone(&providers.capture)));
        let playback = PlaybackController::new(
            Arc::clone(&vault),
            providers.players,
            Arc::clone(&visualizer),
        );
        let capture = CaptureSessionManager::new(
            providers.capture,
            providers.encoders,
            Arc::clone(&gate),
            providers.scheduler,
            Arc::clone(&visualizer),
            config,
        );

        Ok(Self {
            gate,
            visualizer,
            capture,
            playback,
            vault,
            entries,
            transcriber: providers.transcriber,
            shut_down: Mutex::new(false),
        })
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn set_capture_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        self.capture.set_delegate(delegate);
    }

    pub fn set_playback_delegate(&self, delegate: Arc<dyn PlaybackDelegate>) {
        self.playback.set_delegate(delegate);
    }

    pub fn available_devices(&self) -> Result<Vec<AudioSource>, JournalError> {
        self.capture.available_devices()
    }

    // -- Recording ----------------------------------------------------------

    /// Start recording, stopping any playback first.
    pub fn start_recording(&self) -> Result<(), JournalError> {
        self.ensure_open()?;
        if self.playback.stop() {
            log::debug!("Stopped playback before recording");
        }
        self.capture.start()
    }

    pub fn pause_recording(&self) -> Result<(), JournalError> {
        self.capture.pause()
    }

    pub fn resume_recording(&self) -> Result<(), JournalError> {
        self.capture.resume()
    }

    pub fn stop_recording(&self) -> Result<AudioArtifact, JournalError> {
        self.capture.stop()
    }

    /// Discard the active recording. Returns false when nothing was recording.
    pub fn cancel_recording(&self) -> bool {
        self.capture.cancel()
    }

    /// Transcribe a finished recording and persist it as a new entry.
    ///
    /// A transcription failure is logged and the entry keeps an empty
    /// transcript. An empty `title` is replaced by one derived from the
    /// recording time.
    pub fn save_recording(
        &self,
        artifact: AudioArtifact,
        title: &str,
    ) -> Result<VoiceEntry, JournalError> {
        self.ensure_open()?;

        let transcript = match self.transcriber.transcribe(&artifact) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::warn!("Transcription via {} failed: {}", self.transcriber.name(), e);
                String::new()
            }
        };
        let suggestions = text_heuristics::suggest(&transcript);
        let insights = text_heuristics::suggest_insight(suggestions.mood, &suggestions.tags);

        let timestamp = artifact.created_at();
        let duration_secs = artifact.duration_secs();
        let title = match title.trim() {
            "" => format!("Journal entry {}", timestamp.format("%Y-%m-%d %H:%M")),
            t => t.to_string(),
        };

        let artifact_ref = self.vault.store(artifact)?;
        let new_entry = NewEntry {
            title,
            artifact_ref: artifact_ref.clone(),
            transcript,
            duration_secs,
            timestamp,
            mood: suggestions.mood,
            tags: suggestions.tags,
            insights,
        };

        match self.entries.create(new_entry) {
            Ok(entry) => Ok(entry),
            Err(e) => {
                self.vault.discard(&artifact_ref);
                Err(e)
            }
        }
    }

    // -- Playback -----------------------------------------------------------

    /// Play an entry, or toggle pause if it is already the current one.
    pub fn play(&self, entry_id: &str) -> Result<PlaybackOutcome, JournalError> {
        self.ensure_open()?;
        let state = self.capture.state();
        if state.is_active() {
            return Err(JournalError::InvalidState(format!("cannot play while {}", state.name())));
        }
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| JournalError::NotFound(entry_id.to_string()))?;
        self.playback.play(&entry)
    }

    pub fn pause_playback(&self) -> Result<(), JournalError> {
        self.playback.pause()
    }

    pub fn resume_playback(&self) -> Result<(), JournalError> {
        self.playback.resume()
    }

    pub fn stop_playback(&self) -> bool {
        self.playback.stop()
    }

    // -- Entries ------------------------------------------------------------

    pub fn entries<F>(&self, predicate: F) -> Vec<VoiceEntry>
    where
        F: Fn(&VoiceEntry) -> bool,
    {
        self.entries.list(predicate)
    }

    pub fn entry(&self, id: &str) -> Option<VoiceEntry> {
        self.entries.get(id)
    }

    pub fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<VoiceEntry, JournalError> {
        self.entries.update(id, patch)
    }

    pub fn toggle_favorite(&self, id: &str) -> Result<VoiceEntry, JournalError> {
        self.entries.update(id, &EntryPatch::toggle_favorite())
    }

    /// Delete an entry and its audio, stopping it first if it is playing.
    pub fn delete_entry(&self, id: &str) -> Result<VoiceEntry, JournalError> {
        self.ensure_open()?;
        if self.playback.current_entry_id().as_deref() == Some(id) {
            self.playback.stop();
        }
        self.entries.remove(id)
    }

    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            capture: self.capture.snapshot(),
            playback: self.playback.snapshot(),
            permission: self.gate.status(),
            entry_count: self.entries.len(),
            visualizer_mode: self.visualizer.mode(),
            levels: self.visualizer.levels(),
            live_artifacts: self.vault.live_count(),
        }
    }

    /// Release everything: capture, playback, visualizer, artifact handles.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        {
            let mut shut_down = self.shut_down.lock();
            if *shut_down {
                return;
            }
            *shut_down = true;
        }

        self.capture.cancel();
        self.playback.stop();
        self.visualizer.detach();
        let released = self.vault.release_all();
        log::info!("Voice journal shut down ({} artifact references released)", released);
    }

    fn ensure_open(&self) -> Result<(), JournalError> {
        if *self.shut_down.lock() {
            return Err(JournalError::InvalidState("journal is shut down".into()));
        }
        Ok(())
    }
}

impl Drop for VoiceJournal {
    fn drop(&mut self) {
        self.shutdown();
    }
}
