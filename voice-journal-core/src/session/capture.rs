use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;

use crate::models::artifact::AudioArtifact;
use crate::models::audio_models::{AudioSource, CaptureDiagnostics, EncodingDescriptor};
use crate::models::config::JournalConfig;
use crate::models::error::{DeviceError, EncodingError, JournalError};
use crate::models::state::CaptureState;
use crate::session::permission_gate::PermissionGate;
use crate::session::scheduler::{Scheduler, TimerId};
use crate::session::visualizer::AudioVisualizer;
use crate::traits::audio_graph::SourceHandle;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_provider::{CaptureProvider, MediaStream};
use crate::traits::encoder::{self, Encoder, EncoderEvents, EncoderProvider};

/// Point-in-time view of the capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub elapsed_secs: u64,
    pub chunk_count: usize,
    pub buffered_bytes: usize,
    pub encoding: Option<EncodingDescriptor>,
    pub last_error: Option<JournalError>,
}

/// Resources owned by one recording, from `start` until stop/cancel/abort.
struct ActiveSession {
    stream: Arc<dyn MediaStream>,
    encoder: Arc<dyn Encoder>,
    descriptor: EncodingDescriptor,
    chunks: Vec<Vec<u8>>,
    buffered_bytes: usize,
    tick_timer: Option<TimerId>,
    chunk_timer: Option<TimerId>,
}

impl ActiveSession {
    fn take_timers(&mut self) -> Vec<TimerId> {
        self.tick_timer.take().into_iter().chain(self.chunk_timer.take()).collect()
    }
}

/// Internal mutable session state, protected by `parking_lot::Mutex`.
struct SessionState {
    state: CaptureState,
    /// Bumped when a session starts and when it ends. Callbacks carry the
    /// generation they were registered under and are ignored once it no
    /// longer matches.
    generation: u64,
    starting: bool,
    /// Failure reported by a callback of the session still being started.
    pending_failure: Option<JournalError>,
    session: Option<ActiveSession>,
    last_error: Option<JournalError>,
    diagnostics: CaptureDiagnostics,
}

impl SessionState {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            generation: 0,
            starting: false,
            pending_failure: None,
            session: None,
            last_error: None,
            diagnostics: CaptureDiagnostics::default(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.session.is_some()
    }
}

/// State reachable from timer and provider callbacks.
struct Shared {
    state: Mutex<SessionState>,
    delegate: Mutex<Option<Arc<dyn CaptureDelegate>>>,
    scheduler: Arc<dyn Scheduler>,
    visualizer: Arc<AudioVisualizer>,
}

impl Shared {
    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.lock().clone()
    }

    fn notify_state(&self, state: CaptureState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(&state);
        }
    }

    fn on_tick(&self, generation: u64) {
        let elapsed = {
            let mut s = self.state.lock();
            if !s.is_current(generation) {
                return;
            }
            let CaptureState::Recording { elapsed_secs } = s.state else {
                return;
            };
            let elapsed = elapsed_secs + 1;
            s.state = CaptureState::Recording { elapsed_secs: elapsed };
            s.diagnostics.ticks += 1;
            elapsed
        };

        if let Some(delegate) = self.delegate() {
            delegate.on_tick(elapsed);
        }
    }

    fn request_chunk(&self, generation: u64) {
        let encoder = {
            let s = self.state.lock();
            if !s.is_current(generation) {
                return;
            }
            s.session.as_ref().map(|session| Arc::clone(&session.encoder))
        };
        if let Some(encoder) = encoder {
            encoder.request_data();
        }
    }

    fn accept_chunk(&self, generation: u64, chunk: Vec<u8>) {
        let mut s = self.state.lock();
        if !s.is_current(generation) || chunk.is_empty() {
            return;
        }
        s.diagnostics.chunks_received += 1;
        s.diagnostics.bytes_received += chunk.len() as u64;
        if let Some(session) = s.session.as_mut() {
            session.buffered_bytes += chunk.len();
            session.chunks.push(chunk);
        }
    }

    fn schedule_timers(
        self: &Arc<Self>,
        generation: u64,
        config: &TimingConfig,
    ) -> (TimerId, TimerId) {
        let weak = Arc::downgrade(self);
        let tick = self.scheduler.schedule_repeating(
            config.tick_interval,
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_tick(generation);
                }
            }),
        );

        let weak = Arc::downgrade(self);
        let chunk = self.scheduler.schedule_repeating(
            config.chunk_interval,
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.request_chunk(generation);
                }
            }),
        );
        (tick, chunk)
    }

    /// Tear down a session after a stream or encoder failure.
    fn abort(&self, generation: u64, error: JournalError) {
        let session = {
            let mut s = self.state.lock();
            if s.generation != generation {
                return;
            }
            if s.session.is_none() {
                if s.starting && s.pending_failure.is_none() {
                    s.pending_failure = Some(error);
                }
                return;
            }
            s.generation += 1;
            s.state = CaptureState::Idle;
            s.last_error = Some(error.clone());
            s.diagnostics.sessions_aborted += 1;
            s.session.take()
        };
        let Some(session) = session else {
            return;
        };

        log::error!("Capture session aborted: {}", error);
        self.release(session);
        self.notify_state(CaptureState::Idle);
        if let Some(delegate) = self.delegate() {
            delegate.on_error(&error);
        }
    }

    /// Cancel timers, stop the encoder and tracks, detach the visualizer.
    ///
    /// The generation must already have moved on, so the encoder's final
    /// flush is dropped.
    fn release(&self, mut session: ActiveSession) {
        for timer in session.take_timers() {
            self.scheduler.cancel(timer);
        }
        if let Err(e) = session.encoder.stop() {
            log::warn!("Encoder stop failed during teardown: {}", e);
        }
        session.stream.stop_tracks();
        self.detach_visualizer(session.stream.id());
    }

    fn detach_visualizer(&self, stream_id: &str) {
        if self.visualizer.source_id().as_deref() == Some(stream_id) {
            self.visualizer.detach();
        }
    }
}

struct TimingConfig {
    tick_interval: std::time::Duration,
    chunk_interval: std::time::Duration,
}

/// Owns the one capture session: permission, stream, encoder, timers and
/// visualizer attachment.
///
/// ```text
/// [CaptureProvider] → stream ─┬→ [Encoder] → chunks → AudioArtifact
///                             └→ [AudioVisualizer]
/// ```
///
/// Chunk requests and the elapsed tick are repeating timers on the shared
/// scheduler. `stop` flushes the encoder before collecting chunks, so the
/// artifact holds everything emitted up to that instant.
pub struct CaptureSessionManager {
    capture: Arc<dyn CaptureProvider>,
    encoders: Arc<dyn EncoderProvider>,
    gate: Arc<PermissionGate>,
    config: JournalConfig,
    timing: TimingConfig,
    shared: Arc<Shared>,
}

impl CaptureSessionManager {
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        encoders: Arc<dyn EncoderProvider>,
        gate: Arc<PermissionGate>,
        scheduler: Arc<dyn Scheduler>,
        visualizer: Arc<AudioVisualizer>,
        config: JournalConfig,
    ) -> Self {
        let timing = TimingConfig {
            tick_interval: config.tick_interval(),
            chunk_interval: config.chunk_interval(),
        };
        Self {
            capture,
            encoders,
            gate,
            config,
            timing,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::new()),
                delegate: Mutex::new(None),
                scheduler,
                visualizer,
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state.lock().state
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        let s = self.shared.state.lock();
        let session = s.session.as_ref();
        CaptureSnapshot {
            state: s.state,
            elapsed_secs: s.state.elapsed_secs(),
            chunk_count: session.map_or(0, |session| session.chunks.len()),
            buffered_bytes: session.map_or(0, |session| session.buffered_bytes),
            encoding: session.map(|session| session.descriptor.clone()),
            last_error: s.last_error.clone(),
        }
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.state.lock().diagnostics.clone()
    }

    pub fn available_devices(&self) -> Result<Vec<AudioSource>, JournalError> {
        self.capture.enumerate_devices()
    }

    /// Start recording. Transitions: idle/stopped → recording.
    pub fn start(&self) -> Result<(), JournalError> {
        {
            let mut s = self.shared.state.lock();
            if s.state.is_active() || s.starting {
                return Err(JournalError::SessionAlreadyActive);
            }
            s.starting = true;
        }

        let result = self.begin();
        if result.is_err() {
            self.shared.state.lock().starting = false;
        }
        result
    }

    fn begin(&self) -> Result<(), JournalError> {
        self.gate.ensure()?;

        let stream = self.capture.open_stream(&self.config.constraints)?;
        let generation = {
            let mut s = self.shared.state.lock();
            s.generation += 1;
            s.pending_failure = None;
            s.generation
        };

        let session = match self.prepare(&stream, generation) {
            Ok(session) => session,
            Err(e) => {
                stream.stop_tracks();
                return Err(e);
            }
        };

        if let Err(e) = self.shared.visualizer.attach(SourceHandle::Capture(Arc::clone(&stream))) {
            session.encoder.stop().ok();
            stream.stop_tracks();
            return Err(e);
        }

        let (tick, chunk) = self.shared.schedule_timers(generation, &self.timing);
        let session = ActiveSession {
            tick_timer: Some(tick),
            chunk_timer: Some(chunk),
            ..session
        };
        let descriptor = session.descriptor.clone();

        // The stream or encoder may have failed while it was being wired up.
        let failed = {
            let mut s = self.shared.state.lock();
            match s.pending_failure.take() {
                Some(error) => {
                    s.generation += 1;
                    s.last_error = Some(error.clone());
                    s.diagnostics.sessions_aborted += 1;
                    Some((error, session))
                }
                None => {
                    s.session = Some(session);
                    s.state = CaptureState::Recording { elapsed_secs: 0 };
                    s.starting = false;
                    s.last_error = None;
                    s.diagnostics.sessions_started += 1;
                    None
                }
            }
        };
        if let Some((error, session)) = failed {
            log::error!("Capture failed while starting: {}", error);
            self.shared.release(session);
            return Err(error);
        }

        log::info!("Capture started: stream={}, format={}", stream.id(), descriptor);
        self.shared.notify_state(CaptureState::Recording { elapsed_secs: 0 });
        Ok(())
    }

    /// Pick a format, wire callbacks and start the encoder.
    fn prepare(
        &self,
        stream: &Arc<dyn MediaStream>,
        generation: u64,
    ) -> Result<ActiveSession, JournalError> {
        let preferences = self.config.format_preferences();
        let descriptor = encoder::select_format(self.encoders.as_ref(), &preferences)
            .ok_or(EncodingError::NoSupportedFormat)?;

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        stream.on_track_error(Arc::new(move |error| {
            if let Some(shared) = weak.upgrade() {
                shared.abort(generation, as_device_error(error));
            }
        }));

        let on_chunk = Arc::downgrade(&self.shared);
        let on_error = Arc::downgrade(&self.shared);
        let events = EncoderEvents {
            on_chunk: Arc::new(move |chunk| {
                if let Some(shared) = on_chunk.upgrade() {
                    shared.accept_chunk(generation, chunk);
                }
            }),
            on_error: Arc::new(move |error| {
                if let Some(shared) = on_error.upgrade() {
                    shared.abort(generation, error);
                }
            }),
        };

        let encoder = self
            .encoders
            .create_encoder(Arc::clone(stream), &descriptor, events)?;
        if let Err(e) = encoder.start() {
            encoder.stop().ok();
            return Err(e);
        }

        Ok(ActiveSession {
            stream: Arc::clone(stream),
            encoder,
            descriptor,
            chunks: Vec::new(),
            buffered_bytes: 0,
            tick_timer: None,
            chunk_timer: None,
        })
    }

    /// Pause the encoder and the tick. The stream stays open.
    pub fn pause(&self) -> Result<(), JournalError> {
        let (encoder, timers, state) = {
            let mut s = self.shared.state.lock();
            let CaptureState::Recording { elapsed_secs } = s.state else {
                return Err(JournalError::InvalidState(format!(
                    "cannot pause from {}",
                    s.state.name()
                )));
            };
            let Some(session) = s.session.as_mut() else {
                return Err(JournalError::InvalidState("no active session".into()));
            };
            let encoder = Arc::clone(&session.encoder);
            let timers = session.take_timers();
            s.state = CaptureState::Paused { elapsed_secs };
            (encoder, timers, s.state)
        };

        for timer in timers {
            self.shared.scheduler.cancel(timer);
        }
        encoder.pause();
        log::info!("Capture paused at {}s", state.elapsed_secs());
        self.shared.notify_state(state);
        Ok(())
    }

    /// Resume a paused session; the tick continues from the preserved count.
    pub fn resume(&self) -> Result<(), JournalError> {
        let (encoder, generation, elapsed_secs) = {
            let s = self.shared.state.lock();
            let CaptureState::Paused { elapsed_secs } = s.state else {
                return Err(JournalError::InvalidState(format!(
                    "cannot resume from {}",
                    s.state.name()
                )));
            };
            let Some(session) = s.session.as_ref() else {
                return Err(JournalError::InvalidState("no active session".into()));
            };
            (Arc::clone(&session.encoder), s.generation, elapsed_secs)
        };

        encoder.resume();
        let (tick, chunk) = self.shared.schedule_timers(generation, &self.timing);

        let state = CaptureState::Recording { elapsed_secs };
        let installed = {
            let mut s = self.shared.state.lock();
            let current = s.generation == generation;
            let installed = match s.session.as_mut() {
                Some(session) if current => {
                    session.tick_timer = Some(tick);
                    session.chunk_timer = Some(chunk);
                    true
                }
                _ => false,
            };
            if installed {
                s.state = state;
            }
            installed
        };
        if !installed {
            self.shared.scheduler.cancel(tick);
            self.shared.scheduler.cancel(chunk);
            return Err(JournalError::InvalidState("session ended while resuming".into()));
        }
        log::info!("Capture resumed at {}s", elapsed_secs);
        self.shared.notify_state(state);
        Ok(())
    }

    /// Finish the session and return the recorded artifact.
    /// Transitions: recording/paused → stopped.
    pub fn stop(&self) -> Result<AudioArtifact, JournalError> {
        let (encoder, timers, generation) = {
            let mut s = self.shared.state.lock();
            if !s.state.is_active() {
                return Err(JournalError::InvalidState(format!(
                    "cannot stop from {}",
                    s.state.name()
                )));
            }
            let generation = s.generation;
            let Some(session) = s.session.as_mut() else {
                return Err(JournalError::InvalidState("no active session".into()));
            };
            (Arc::clone(&session.encoder), session.take_timers(), generation)
        };

        for timer in timers {
            self.shared.scheduler.cancel(timer);
        }

        // The final chunk arrives through on_chunk while the generation still
        // matches.
        if let Err(e) = encoder.stop() {
            self.shared.abort(generation, e.clone());
            return Err(e);
        }

        let (session, elapsed_secs) = {
            let mut s = self.shared.state.lock();
            if !s.is_current(generation) {
                return Err(s.last_error.clone().unwrap_or_else(|| {
                    JournalError::InvalidState("session ended while stopping".into())
                }));
            }
            let elapsed_secs = s.state.elapsed_secs();
            s.generation += 1;
            s.state = CaptureState::Stopped { elapsed_secs };
            (s.session.take(), elapsed_secs)
        };
        let Some(session) = session else {
            return Err(JournalError::InvalidState("no active session".into()));
        };

        session.stream.stop_tracks();
        self.shared.detach_visualizer(session.stream.id());

        let artifact = AudioArtifact::from_chunks(
            session.chunks,
            session.descriptor,
            elapsed_secs as f64,
            Utc::now(),
        );
        log::info!(
            "Capture stopped: {}s, {} bytes, format={}",
            elapsed_secs,
            artifact.len(),
            artifact.encoding()
        );

        self.shared.notify_state(CaptureState::Stopped { elapsed_secs });
        if let Some(delegate) = self.shared.delegate() {
            delegate.on_capture_finished(&artifact);
        }
        Ok(artifact)
    }

    /// Discard the active session without producing an artifact.
    /// Returns false when nothing was active.
    pub fn cancel(&self) -> bool {
        let session = {
            let mut s = self.shared.state.lock();
            let Some(session) = s.session.take() else {
                return false;
            };
            s.generation += 1;
            s.state = CaptureState::Idle;
            session
        };

        log::info!("Capture cancelled");
        self.shared.release(session);
        self.shared.notify_state(CaptureState::Idle);
        true
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn as_device_error(error: JournalError) -> JournalError {
    match error {
        JournalError::Device(_) => error,
        other => DeviceError::Disconnected(other.to_string()).into(),
    }
}
