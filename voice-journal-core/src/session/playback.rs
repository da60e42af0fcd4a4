use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::entry::{ArtifactRef, VoiceEntry};
use crate::models::error::JournalError;
use crate::session::visualizer::AudioVisualizer;
use crate::storage::artifact_vault::ArtifactVault;
use crate::traits::audio_graph::SourceHandle;
use crate::traits::playback_delegate::{PlaybackDelegate, PlaybackEnd};
use crate::traits::player::{PlaybackProvider, Player, PlayerEvents};

/// What a call to `play` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Started,
    Paused,
    Resumed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub entry_id: Option<String>,
    pub artifact_ref: Option<ArtifactRef>,
    pub is_paused: bool,
    pub last_error: Option<JournalError>,
}

struct Current {
    entry_id: String,
    artifact_ref: ArtifactRef,
    player: Arc<dyn Player>,
    paused: bool,
    generation: u64,
}

#[derive(Default)]
struct PlaybackState {
    current: Option<Current>,
    generation: u64,
    last_error: Option<JournalError>,
}

impl PlaybackState {
    /// Take the current playback if it belongs to `generation`.
    fn take_if(&mut self, generation: u64) -> Option<Current> {
        if self.current.as_ref().map(|c| c.generation) != Some(generation) {
            return None;
        }
        self.generation += 1;
        self.current.take()
    }
}

struct Shared {
    state: Mutex<PlaybackState>,
    delegate: Mutex<Option<Arc<dyn PlaybackDelegate>>>,
    visualizer: Arc<AudioVisualizer>,
}

impl Shared {
    fn delegate(&self) -> Option<Arc<dyn PlaybackDelegate>> {
        self.delegate.lock().clone()
    }

    fn detach_visualizer(&self, player: &dyn Player) {
        if self.visualizer.source_id().as_deref() == Some(player.id()) {
            self.visualizer.detach();
        }
    }

    /// End the current playback. The delegate hears about it exactly once.
    fn finish(&self, generation: u64, end: PlaybackEnd) {
        let Some(current) = self.state.lock().take_if(generation) else {
            return;
        };
        if end == PlaybackEnd::Stopped {
            current.player.stop();
        }
        self.detach_visualizer(current.player.as_ref());
        log::debug!("Playback of {} finished: {:?}", current.entry_id, end);
        if let Some(delegate) = self.delegate() {
            delegate.on_finished(&current.entry_id, end);
        }
    }

    fn fail(&self, generation: u64, error: JournalError) {
        let current = {
            let mut s = self.state.lock();
            let Some(current) = s.take_if(generation) else {
                return;
            };
            s.last_error = Some(error.clone());
            current
        };
        current.player.stop();
        self.detach_visualizer(current.player.as_ref());
        log::warn!("Playback of {} failed: {}", current.entry_id, error);
        if let Some(delegate) = self.delegate() {
            delegate.on_error(&current.entry_id, &error);
        }
    }
}

/// Plays one entry at a time and binds the visualizer to it.
///
/// Playing another entry stops the current one first. Completion and error
/// callbacks are tied to the playback that registered them; once that
/// playback has ended they do nothing.
pub struct PlaybackController {
    vault: Arc<ArtifactVault>,
    players: Arc<dyn PlaybackProvider>,
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(
        vault: Arc<ArtifactVault>,
        players: Arc<dyn PlaybackProvider>,
        visualizer: Arc<AudioVisualizer>,
    ) -> Self {
        Self {
            vault,
            players,
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::default()),
                delegate: Mutex::new(None),
                visualizer,
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn PlaybackDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    /// Play `entry`, or toggle pause if it is the entry already playing.
    pub fn play(&self, entry: &VoiceEntry) -> Result<PlaybackOutcome, JournalError> {
        let same_entry = {
            let s = self.shared.state.lock();
            s.current
                .as_ref()
                .filter(|c| c.entry_id == entry.id)
                .map(|c| c.paused)
        };
        match same_entry {
            Some(false) => return self.pause().map(|_| PlaybackOutcome::Paused),
            Some(true) => return self.resume().map(|_| PlaybackOutcome::Resumed),
            None => {}
        }

        self.stop();

        let source = self.vault.materialize(&entry.artifact_ref)?;
        let generation = {
            let mut s = self.shared.state.lock();
            s.generation += 1;
            s.generation
        };

        let on_ended = Arc::downgrade(&self.shared);
        let on_error = Arc::downgrade(&self.shared);
        let events = PlayerEvents {
            on_ended: Arc::new(move || {
                if let Some(shared) = on_ended.upgrade() {
                    shared.finish(generation, PlaybackEnd::Completed);
                }
            }),
            on_error: Arc::new(move |error| {
                if let Some(shared) = on_error.upgrade() {
                    shared.fail(generation, error);
                }
            }),
        };

        let player = self.players.create_player(&source, events)?;

        // Installed before `play` so callbacks fired from inside it find it.
        {
            let mut s = self.shared.state.lock();
            s.current = Some(Current {
                entry_id: entry.id.clone(),
                artifact_ref: entry.artifact_ref.clone(),
                player: Arc::clone(&player),
                paused: false,
                generation,
            });
            s.last_error = None;
        }
        if let Some(delegate) = self.shared.delegate() {
            delegate.on_started(&entry.id);
        }

        if let Err(e) = player.play() {
            self.shared.fail(generation, e.clone());
            return Err(e);
        }
        if !self.is_current(generation) {
            log::debug!("Playback of {} ended while starting", entry.id);
            return Ok(PlaybackOutcome::Started);
        }
        if let Err(e) = self.shared.visualizer.attach(SourceHandle::Playback(Arc::clone(&player))) {
            self.shared.fail(generation, e.clone());
            return Err(e);
        }
        if !self.is_current(generation) {
            self.shared.detach_visualizer(player.as_ref());
        }

        log::info!("Playing entry {} ({})", entry.id, source.url);
        Ok(PlaybackOutcome::Started)
    }

    pub fn pause(&self) -> Result<(), JournalError> {
        let player = {
            let mut s = self.shared.state.lock();
            match s.current.as_mut() {
                Some(current) if !current.paused => {
                    current.paused = true;
                    Arc::clone(&current.player)
                }
                Some(_) => return Err(JournalError::InvalidState("playback already paused".into())),
                None => return Err(JournalError::InvalidState("nothing is playing".into())),
            }
        };
        player.pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), JournalError> {
        let player = {
            let s = self.shared.state.lock();
            match s.current.as_ref() {
                Some(current) if current.paused => Arc::clone(&current.player),
                Some(_) => return Err(JournalError::InvalidState("playback is not paused".into())),
                None => return Err(JournalError::InvalidState("nothing is playing".into())),
            }
        };
        player.resume()?;
        if let Some(current) = self.shared.state.lock().current.as_mut() {
            current.paused = false;
        }
        Ok(())
    }

    /// Stop the current playback. Returns false when nothing was playing.
    pub fn stop(&self) -> bool {
        let generation = {
            let s = self.shared.state.lock();
            match s.current.as_ref() {
                Some(current) => current.generation,
                None => return false,
            }
        };
        self.shared.finish(generation, PlaybackEnd::Stopped);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.state.lock().current.as_ref().map(|c| c.generation) == Some(generation)
    }

    pub fn current_entry_id(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .current
            .as_ref()
            .map(|c| c.entry_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().current.is_some()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let s = self.shared.state.lock();
        let current = s.current.as_ref();
        PlaybackSnapshot {
            entry_id: current.map(|c| c.entry_id.clone()),
            artifact_ref: current.map(|c| c.artifact_ref.clone()),
            is_paused: current.map_or(false, |c| c.paused),
            last_error: s.last_error.clone(),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    use crate::models::artifact::AudioArtifact;
    use crate::models::audio_models::{EncodingDescriptor, SourceMode};
    use crate::models::entry::{Mood, NewEntry};
    use crate::models::error::PlaybackError;
    use crate::session::scheduler::ManualScheduler;
    use crate::sim::{SimGraphProvider, SimPlaybackProvider, SimPlayerState, SimSurface};

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl PlaybackDelegate for EventLog {
        fn on_started(&self, entry_id: &str) {
            self.events.lock().push(format!("started {}", entry_id));
        }

        fn on_finished(&self, entry_id: &str, end: PlaybackEnd) {
            self.events.lock().push(format!("finished {} {:?}", entry_id, end));
        }

        fn on_error(&self, entry_id: &str, _error: &JournalError) {
            self.events.lock().push(format!("error {}", entry_id));
        }
    }

    struct Harness {
        scheduler: Arc<ManualScheduler>,
        vault: Arc<ArtifactVault>,
        graphs: Arc<SimGraphProvider>,
        players: Arc<SimPlaybackProvider>,
        visualizer: Arc<AudioVisualizer>,
        log: Arc<EventLog>,
        controller: PlaybackController,
    }

    fn harness() -> Harness {
        let scheduler = ManualScheduler::new();
        let vault = Arc::new(ArtifactVault::in_memory());
        let graphs = Arc::new(SimGraphProvider::new());
        let players = Arc::new(SimPlaybackProvider::new());
        let visualizer = Arc::new(AudioVisualizer::new(
            graphs.clone(),
            scheduler.clone(),
            Box::new(SimSurface::new(100, 50)),
            64,
            Duration::from_millis(16),
        ));
        let controller =
            PlaybackController::new(vault.clone(), players.clone(), visualizer.clone());
        let log = Arc::new(EventLog::default());
        controller.set_delegate(log.clone());
        Harness {
            scheduler,
            vault,
            graphs,
            players,
            visualizer,
            log,
            controller,
        }
    }

    fn entry(vault: &ArtifactVault, id: &str) -> VoiceEntry {
        let encoding = EncodingDescriptor::new("audio/webm");
        let artifact = AudioArtifact::new(vec![1, 2, 3], encoding, 3.0, Utc::now());
        NewEntry {
            title: id.to_string(),
            artifact_ref: vault.store(artifact).unwrap(),
            transcript: String::new(),
            duration_secs: 3.0,
            timestamp: Utc::now(),
            mood: Mood::Neutral,
            tags: Default::default(),
            insights: String::new(),
        }
        .into_entry(id.to_string())
    }

    #[test]
    fn playing_another_entry_stops_the_first() {
        let h = harness();
        let a = entry(&h.vault, "a");
        let b = entry(&h.vault, "b");

        h.controller.play(&a).unwrap();
        let player_a = h.players.last_player().unwrap();
        h.controller.play(&b).unwrap();
        let player_b = h.players.last_player().unwrap();

        assert_eq!(player_a.state(), SimPlayerState::Stopped);
        assert_eq!(player_b.state(), SimPlayerState::Playing);
        assert_eq!(h.controller.current_entry_id().as_deref(), Some("b"));
        assert_eq!(h.visualizer.source_id().as_deref(), Some(player_b.id()));
        assert_eq!(h.visualizer.mode(), Some(SourceMode::Playback));
        assert_eq!(h.graphs.live_graphs(), 1);

        // A late error from the replaced player is ignored.
        player_a.fail(PlaybackError::DecodeFailure("late".into()).into());

        assert_eq!(
            *h.log.events.lock(),
            vec!["started a", "finished a Stopped", "started b"]
        );
    }

    #[test]
    fn same_entry_toggles_pause() {
        let h = harness();
        let a = entry(&h.vault, "a");

        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Started);
        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Paused);
        assert_eq!(h.players.last_player().unwrap().state(), SimPlayerState::Paused);
        assert!(h.controller.snapshot().is_paused);

        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Resumed);
        assert_eq!(h.players.last_player().unwrap().state(), SimPlayerState::Playing);
        assert_eq!(h.players.players_created(), 1);
    }

    #[test]
    fn completion_clears_current_and_detaches() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.controller.play(&a).unwrap();
        h.scheduler.advance(Duration::from_millis(100));

        h.players.last_player().unwrap().finish();

        assert!(h.controller.current_entry_id().is_none());
        assert!(!h.visualizer.is_attached());
        assert_eq!(h.scheduler.active_timers(), 0);
        assert_eq!(*h.log.events.lock(), vec!["started a", "finished a Completed"]);

        // Replaying starts fresh.
        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Started);
    }

    #[test]
    fn player_error_is_reported_once() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.controller.play(&a).unwrap();

        let player = h.players.last_player().unwrap();
        player.fail(PlaybackError::DecodeFailure("bad frame".into()).into());
        player.fail(PlaybackError::DecodeFailure("bad frame".into()).into());

        assert!(!h.controller.is_active());
        assert!(h.controller.snapshot().last_error.is_some());
        assert_eq!(*h.log.events.lock(), vec!["started a", "error a"]);
        assert!(!h.controller.stop());
    }

    #[test]
    fn released_artifact_is_unavailable() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.vault.discard(&a.artifact_ref);

        let err = h.controller.play(&a).unwrap_err();
        assert!(matches!(err, JournalError::Playback(PlaybackError::ResourceUnavailable(_))));
        assert_eq!(h.players.players_created(), 0);
        assert!(!h.visualizer.is_attached());
    }

    #[test]
    fn failed_start_leaves_nothing_playing() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.players.set_fail_play(true);

        assert!(h.controller.play(&a).is_err());
        assert!(!h.controller.is_active());
        assert!(!h.visualizer.is_attached());
        assert!(h.controller.snapshot().last_error.is_some());
        assert_eq!(*h.log.events.lock(), vec!["started a", "error a"]);
    }

    #[test]
    fn end_reported_inside_play_clears_current() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.players.set_end_on_play(true);

        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Started);
        assert_eq!(h.players.last_player().unwrap().state(), SimPlayerState::Ended);
        assert!(h.controller.current_entry_id().is_none());
        assert!(!h.visualizer.is_attached());
        assert_eq!(h.graphs.live_graphs(), 0);
        assert_eq!(h.scheduler.active_timers(), 0);
        assert_eq!(*h.log.events.lock(), vec!["started a", "finished a Completed"]);

        h.players.set_end_on_play(false);
        assert_eq!(h.controller.play(&a).unwrap(), PlaybackOutcome::Started);
        assert_eq!(h.controller.current_entry_id().as_deref(), Some("a"));
    }

    #[test]
    fn visualizer_failure_ends_playback() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.graphs.fail_next_connect();

        assert!(h.controller.play(&a).is_err());
        assert!(!h.controller.is_active());
        assert_eq!(h.players.last_player().unwrap().state(), SimPlayerState::Stopped);
        assert_eq!(*h.log.events.lock(), vec!["started a", "error a"]);
    }

    #[test]
    fn stop_ends_playback_explicitly() {
        let h = harness();
        let a = entry(&h.vault, "a");
        h.controller.play(&a).unwrap();

        assert!(h.controller.stop());
        assert!(!h.controller.stop());
        assert!(!h.visualizer.is_attached());
        assert_eq!(*h.log.events.lock(), vec!["started a", "finished a Stopped"]);
        assert!(matches!(h.controller.pause(), Err(JournalError::InvalidState(_))));
        assert!(matches!(h.controller.resume(), Err(JournalError::InvalidState(_))));
    }
}
