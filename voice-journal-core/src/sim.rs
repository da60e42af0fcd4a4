//! In-process providers for tests and headless hosts.
//!
//! Each provider records what was asked of it and lets the caller inject
//! decisions and failures (a denied prompt, a busy device, a track that dies
//! mid-session, a player that reaches its end).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{
    AudioSource, EncodingDescriptor, SourceMode, StreamConstraints, WavePoint,
};
use crate::models::error::{
    DeviceError, EncodingError, JournalError, PermissionError, PlaybackError,
};
use crate::models::permission::{PermissionStatus, SupportReport};
use crate::storage::artifact_vault::PlayableSource;
use crate::traits::audio_graph::{AudioGraph, AudioGraphProvider, DrawingSurface, SourceHandle};
use crate::traits::capture_provider::{CaptureProvider, MediaStream, StreamErrorCallback};
use crate::traits::encoder::{Encoder, EncoderEvents, EncoderProvider};
use crate::traits::player::{PlaybackProvider, Player, PlayerEvents};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{}-{}", prefix, NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// What the simulated user/platform answers when a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
    NoDevice,
    Busy,
}

/// A simulated capture stream.
pub struct SimStream {
    id: String,
    constraints: StreamConstraints,
    active: Mutex<bool>,
    on_error: Mutex<Option<StreamErrorCallback>>,
}

impl SimStream {
    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    /// Kill the stream's track as an unplugged device would.
    pub fn fail(&self, error: JournalError) {
        *self.active.lock() = false;
        let callback = self.on_error.lock().clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }
}

impl MediaStream for SimStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_active(&self) -> bool {
        *self.active.lock()
    }

    fn stop_tracks(&self) {
        *self.active.lock() = false;
    }

    fn on_track_error(&self, callback: StreamErrorCallback) {
        *self.on_error.lock() = Some(callback);
    }
}

struct CaptureInner {
    decision: AccessDecision,
    introspection: Option<PermissionStatus>,
    support: SupportReport,
    devices: Vec<AudioSource>,
    streams: Vec<Arc<SimStream>>,
}

impl CaptureInner {
    fn observe(&mut self, status: PermissionStatus) {
        if self.introspection.is_some() {
            self.introspection = Some(status);
        }
    }
}

/// Simulated microphone access.
///
/// Introspection mirrors the decision: once a stream is granted or denied,
/// `query_permission` reports it, unless introspection was switched off.
pub struct SimCaptureProvider {
    inner: Mutex<CaptureInner>,
}

impl Default for SimCaptureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCaptureProvider {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CaptureInner {
                decision: AccessDecision::Allow,
                introspection: Some(PermissionStatus::Prompt),
                support: SupportReport {
                    is_supported: true,
                    is_secure_context: true,
                },
                devices: vec![AudioSource {
                    id: "default".into(),
                    label: "Simulated Microphone".into(),
                    is_default: true,
                }],
                streams: Vec::new(),
            }),
        }
    }

    pub fn set_decision(&self, decision: AccessDecision) {
        self.inner.lock().decision = decision;
    }

    /// Status reported by `query_permission`; `None` disables introspection.
    pub fn set_introspection(&self, status: Option<PermissionStatus>) {
        self.inner.lock().introspection = status;
    }

    pub fn set_support(&self, support: SupportReport) {
        self.inner.lock().support = support;
    }

    pub fn set_devices(&self, devices: Vec<AudioSource>) {
        self.inner.lock().devices = devices;
    }

    pub fn streams_opened(&self) -> usize {
        self.inner.lock().streams.len()
    }

    /// Streams whose tracks are still live.
    pub fn active_streams(&self) -> usize {
        self.inner.lock().streams.iter().filter(|s| s.is_active()).count()
    }

    pub fn last_stream(&self) -> Option<Arc<SimStream>> {
        self.inner.lock().streams.last().cloned()
    }
}

impl CaptureProvider for SimCaptureProvider {
    fn check_support(&self) -> SupportReport {
        self.inner.lock().support
    }

    fn query_permission(&self) -> Option<PermissionStatus> {
        self.inner.lock().introspection
    }

    fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn MediaStream>, JournalError> {
        let mut inner = self.inner.lock();
        let decision = inner.decision;
        match decision {
            AccessDecision::Deny => {
                inner.observe(PermissionStatus::Denied);
                Err(PermissionError::Denied.into())
            }
            AccessDecision::NoDevice => Err(DeviceError::NotFound.into()),
            AccessDecision::Busy => Err(DeviceError::Busy.into()),
            AccessDecision::Allow => {
                inner.observe(PermissionStatus::Granted);
                let stream = Arc::new(SimStream {
                    id: next_id("stream"),
                    constraints: constraints.clone(),
                    active: Mutex::new(true),
                    on_error: Mutex::new(None),
                });
                inner.streams.push(Arc::clone(&stream));
                Ok(stream)
            }
        }
    }

    fn enumerate_devices(&self) -> Result<Vec<AudioSource>, JournalError> {
        Ok(self.inner.lock().devices.clone())
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEncoderState {
    Inactive,
    Recording,
    Paused,
    Stopped,
}

struct EncoderInner {
    state: SimEncoderState,
    buffered: Vec<u8>,
    emitted_chunks: usize,
    sequence: u8,
}

/// A simulated encoder.
///
/// Every `request_data` while recording encodes `chunk_bytes` more bytes and
/// emits everything buffered. `stop` encodes a `tail_bytes` remainder and
/// flushes it as the final chunk.
pub struct SimEncoder {
    descriptor: EncodingDescriptor,
    stream: Arc<dyn MediaStream>,
    events: EncoderEvents,
    chunk_bytes: usize,
    tail_bytes: usize,
    fail_on_start: bool,
    inner: Mutex<EncoderInner>,
}

impl SimEncoder {
    pub fn state(&self) -> SimEncoderState {
        self.inner.lock().state
    }

    pub fn descriptor(&self) -> &EncodingDescriptor {
        &self.descriptor
    }

    pub fn stream_id(&self) -> &str {
        self.stream.id()
    }

    pub fn emitted_chunks(&self) -> usize {
        self.inner.lock().emitted_chunks
    }

    /// Append raw encoded bytes to the pending buffer.
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.lock().buffered.extend_from_slice(bytes);
    }

    /// Report an encoder failure through `on_error`.
    pub fn fail(&self, message: &str) {
        self.inner.lock().state = SimEncoderState::Stopped;
        (self.events.on_error)(EncodingError::EncoderFailed(message.to_string()).into());
    }

    fn encode(inner: &mut EncoderInner, len: usize) {
        let seq = inner.sequence;
        inner.sequence = inner.sequence.wrapping_add(1);
        inner.buffered.extend(std::iter::repeat(seq).take(len));
    }

    fn emit(&self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            (self.events.on_chunk)(chunk);
        }
    }
}

impl Encoder for SimEncoder {
    fn start(&self) -> Result<(), JournalError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != SimEncoderState::Inactive {
                return Err(EncodingError::EncoderFailed("encoder already started".into()).into());
            }
            inner.state = SimEncoderState::Recording;
        }
        if self.fail_on_start {
            self.fail("encoder rejected the stream");
        }
        Ok(())
    }

    fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SimEncoderState::Recording {
            inner.state = SimEncoderState::Paused;
        }
    }

    fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SimEncoderState::Paused {
            inner.state = SimEncoderState::Recording;
        }
    }

    fn request_data(&self) {
        let chunk = {
            let mut inner = self.inner.lock();
            match inner.state {
                SimEncoderState::Recording => Self::encode(&mut inner, self.chunk_bytes),
                SimEncoderState::Paused => {}
                _ => return,
            }
            if !inner.buffered.is_empty() {
                inner.emitted_chunks += 1;
            }
            std::mem::take(&mut inner.buffered)
        };
        self.emit(chunk);
    }

    fn stop(&self) -> Result<(), JournalError> {
        let chunk = {
            let mut inner = self.inner.lock();
            match inner.state {
                SimEncoderState::Stopped => return Ok(()),
                SimEncoderState::Recording => Self::encode(&mut inner, self.tail_bytes),
                _ => {}
            }
            inner.state = SimEncoderState::Stopped;
            if !inner.buffered.is_empty() {
                inner.emitted_chunks += 1;
            }
            std::mem::take(&mut inner.buffered)
        };
        self.emit(chunk);
        Ok(())
    }
}

struct EncoderProviderInner {
    supported: Vec<String>,
    fail_create: bool,
    fail_on_start: bool,
    chunk_bytes: usize,
    tail_bytes: usize,
    encoders: Vec<Arc<SimEncoder>>,
}

/// Factory for [`SimEncoder`]s with a configurable set of supported formats.
pub struct SimEncoderProvider {
    inner: Mutex<EncoderProviderInner>,
}

impl Default for SimEncoderProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEncoderProvider {
    /// Supports WebM/Opus and plain WebM.
    pub fn new() -> Self {
        Self::with_formats(&["audio/webm;codecs=opus", "audio/webm"])
    }

    pub fn with_formats(formats: &[&str]) -> Self {
        Self {
            inner: Mutex::new(EncoderProviderInner {
                supported: formats.iter().map(|f| f.to_string()).collect(),
                fail_create: false,
                fail_on_start: false,
                chunk_bytes: 1000,
                tail_bytes: 250,
                encoders: Vec::new(),
            }),
        }
    }

    /// Bytes encoded per chunk request and at the final flush.
    pub fn set_chunk_sizes(&self, chunk_bytes: usize, tail_bytes: usize) {
        let mut inner = self.inner.lock();
        inner.chunk_bytes = chunk_bytes;
        inner.tail_bytes = tail_bytes;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.lock().fail_create = fail;
    }

    /// Make encoders report an error from inside `start`, before it returns.
    pub fn set_fail_on_start(&self, fail: bool) {
        self.inner.lock().fail_on_start = fail;
    }

    pub fn encoders_created(&self) -> usize {
        self.inner.lock().encoders.len()
    }

    pub fn last_encoder(&self) -> Option<Arc<SimEncoder>> {
        self.inner.lock().encoders.last().cloned()
    }
}

impl EncoderProvider for SimEncoderProvider {
    fn is_format_supported(&self, descriptor: &EncodingDescriptor) -> bool {
        self.inner
            .lock()
            .supported
            .iter()
            .any(|f| f == descriptor.mime_type())
    }

    fn create_encoder(
        &self,
        stream: Arc<dyn MediaStream>,
        descriptor: &EncodingDescriptor,
        events: EncoderEvents,
    ) -> Result<Arc<dyn Encoder>, JournalError> {
        let mut inner = self.inner.lock();
        if inner.fail_create {
            return Err(EncodingError::EncoderFailed("encoder construction failed".into()).into());
        }
        if !inner.supported.iter().any(|f| f == descriptor.mime_type()) {
            return Err(EncodingError::NoSupportedFormat.into());
        }
        let encoder = Arc::new(SimEncoder {
            descriptor: descriptor.clone(),
            stream,
            events,
            chunk_bytes: inner.chunk_bytes,
            tail_bytes: inner.tail_bytes,
            fail_on_start: inner.fail_on_start,
            inner: Mutex::new(EncoderInner {
                state: SimEncoderState::Inactive,
                buffered: Vec::new(),
                emitted_chunks: 0,
                sequence: 0,
            }),
        });
        inner.encoders.push(Arc::clone(&encoder));
        Ok(encoder)
    }
}

// ---------------------------------------------------------------------------
// Audio graph and drawing surface
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GraphCounters {
    live: usize,
    max_concurrent: usize,
    created: usize,
    fail_next_connect: bool,
    last_mode: Option<SourceMode>,
}

/// Audio graph producing a sine wave on its analyser.
struct SimGraph {
    counters: Arc<Mutex<GraphCounters>>,
    connected: bool,
    closed: bool,
    phase: usize,
}

impl AudioGraph for SimGraph {
    fn connect_analyser(
        &mut self,
        source: &SourceHandle,
        _fft_size: usize,
    ) -> Result<(), JournalError> {
        let mut counters = self.counters.lock();
        if counters.fail_next_connect {
            counters.fail_next_connect = false;
            return Err(
                PlaybackError::ResourceUnavailable("analyser connection refused".into()).into(),
            );
        }
        counters.last_mode = Some(source.mode());
        self.connected = true;
        Ok(())
    }

    fn time_domain_data(&mut self, out: &mut [u8]) {
        if !self.connected {
            out.fill(128);
            return;
        }
        for (i, sample) in out.iter_mut().enumerate() {
            let t = (self.phase + i) as f32 / 32.0;
            let value = 128.0 + 64.0 * (t * std::f32::consts::TAU).sin();
            *sample = value.round().clamp(0.0, 255.0) as u8;
        }
        self.phase += out.len();
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.connected = false;
            self.counters.lock().live -= 1;
        }
    }
}

impl Drop for SimGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// Factory for simulated graphs, tracking how many are alive at once.
#[derive(Default)]
pub struct SimGraphProvider {
    counters: Arc<Mutex<GraphCounters>>,
}

impl SimGraphProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_connect(&self) {
        self.counters.lock().fail_next_connect = true;
    }

    /// Graphs created and not yet closed.
    pub fn live_graphs(&self) -> usize {
        self.counters.lock().live
    }

    pub fn max_concurrent_graphs(&self) -> usize {
        self.counters.lock().max_concurrent
    }

    pub fn graphs_created(&self) -> usize {
        self.counters.lock().created
    }

    /// Source mode of the most recent successful connection.
    pub fn last_mode(&self) -> Option<SourceMode> {
        self.counters.lock().last_mode
    }
}

impl AudioGraphProvider for SimGraphProvider {
    fn create_graph(&self) -> Result<Box<dyn AudioGraph>, JournalError> {
        {
            let mut counters = self.counters.lock();
            counters.live += 1;
            counters.created += 1;
            counters.max_concurrent = counters.max_concurrent.max(counters.live);
        }
        Ok(Box::new(SimGraph {
            counters: Arc::clone(&self.counters),
            connected: false,
            closed: false,
            phase: 0,
        }))
    }
}

#[derive(Default)]
struct SurfaceLog {
    clears: usize,
    strokes: usize,
    last_polyline: Vec<WavePoint>,
}

/// Drawing surface that records what was drawn. Clones share one log.
#[derive(Clone)]
pub struct SimSurface {
    width: u32,
    height: u32,
    log: Arc<Mutex<SurfaceLog>>,
}

impl SimSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            log: Arc::new(Mutex::new(SurfaceLog::default())),
        }
    }

    pub fn clear_count(&self) -> usize {
        self.log.lock().clears
    }

    pub fn stroke_count(&self) -> usize {
        self.log.lock().strokes
    }

    pub fn last_polyline(&self) -> Vec<WavePoint> {
        self.log.lock().last_polyline.clone()
    }
}

impl DrawingSurface for SimSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        let mut log = self.log.lock();
        log.clears += 1;
        log.last_polyline.clear();
    }

    fn stroke_polyline(&mut self, points: &[WavePoint]) {
        let mut log = self.log.lock();
        log.strokes += 1;
        log.last_polyline = points.to_vec();
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPlayerState {
    Ready,
    Playing,
    Paused,
    Ended,
    Stopped,
}

/// A simulated playback element.
pub struct SimPlayer {
    id: String,
    url: String,
    events: PlayerEvents,
    fail_play: bool,
    end_on_play: bool,
    state: Mutex<SimPlayerState>,
}

impl SimPlayer {
    pub fn state(&self) -> SimPlayerState {
        *self.state.lock()
    }

    /// Locator of the source this player was created for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reach the end of the source, firing `on_ended`.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            if !matches!(*state, SimPlayerState::Playing | SimPlayerState::Paused) {
                return;
            }
            *state = SimPlayerState::Ended;
        }
        (self.events.on_ended)();
    }

    /// Fail mid-playback, firing `on_error`.
    pub fn fail(&self, error: JournalError) {
        *self.state.lock() = SimPlayerState::Stopped;
        (self.events.on_error)(error);
    }
}

impl Player for SimPlayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn play(&self) -> Result<(), JournalError> {
        if self.fail_play {
            return Err(PlaybackError::DecodeFailure("unsupported media".into()).into());
        }
        *self.state.lock() = SimPlayerState::Playing;
        if self.end_on_play {
            self.finish();
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if *state == SimPlayerState::Playing {
            *state = SimPlayerState::Paused;
        }
    }

    fn resume(&self) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        match *state {
            SimPlayerState::Paused | SimPlayerState::Playing => {
                *state = SimPlayerState::Playing;
                Ok(())
            }
            other => Err(JournalError::InvalidState(format!(
                "cannot resume player in {:?}",
                other
            ))),
        }
    }

    fn stop(&self) {
        *self.state.lock() = SimPlayerState::Stopped;
    }
}

#[derive(Default)]
struct PlaybackInner {
    fail_play: bool,
    end_on_play: bool,
    players: Vec<Arc<SimPlayer>>,
}

/// Factory for [`SimPlayer`]s.
#[derive(Default)]
pub struct SimPlaybackProvider {
    inner: Mutex<PlaybackInner>,
}

impl SimPlaybackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make players created from now on fail to start.
    pub fn set_fail_play(&self, fail: bool) {
        self.inner.lock().fail_play = fail;
    }

    /// Make players created from now on reach their end inside `play`, as a
    /// zero-length source does.
    pub fn set_end_on_play(&self, end: bool) {
        self.inner.lock().end_on_play = end;
    }

    pub fn players_created(&self) -> usize {
        self.inner.lock().players.len()
    }

    pub fn last_player(&self) -> Option<Arc<SimPlayer>> {
        self.inner.lock().players.last().cloned()
    }

    /// A player with no-op callbacks, not bound to any stored artifact.
    pub fn standalone_player(&self) -> Arc<dyn Player> {
        self.build("blob:voice-journal/standalone".into(), PlayerEvents {
            on_ended: Arc::new(|| {}),
            on_error: Arc::new(|_| {}),
        })
    }

    fn build(&self, url: String, events: PlayerEvents) -> Arc<SimPlayer> {
        let mut inner = self.inner.lock();
        let player = Arc::new(SimPlayer {
            id: next_id("player"),
            url,
            events,
            fail_play: inner.fail_play,
            end_on_play: inner.end_on_play,
            state: Mutex::new(SimPlayerState::Ready),
        });
        inner.players.push(Arc::clone(&player));
        player
    }
}

impl PlaybackProvider for SimPlaybackProvider {
    fn create_player(
        &self,
        source: &PlayableSource,
        events: PlayerEvents,
    ) -> Result<Arc<dyn Player>, JournalError> {
        if source.bytes.is_empty() {
            return Err(PlaybackError::DecodeFailure("empty source".into()).into());
        }
        Ok(self.build(source.url.clone(), events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(log: Arc<Mutex<Vec<usize>>>) -> EncoderEvents {
        EncoderEvents {
            on_chunk: Arc::new(move |chunk| log.lock().push(chunk.len())),
            on_error: Arc::new(|_| {}),
        }
    }

    #[test]
    fn encoder_flushes_tail_on_stop() {
        let capture = SimCaptureProvider::new();
        let provider = SimEncoderProvider::new();
        provider.set_chunk_sizes(10, 3);
        let stream = capture.open_stream(&StreamConstraints::default()).unwrap();
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let encoder = provider
            .create_encoder(stream, &EncodingDescriptor::new("audio/webm"), events(chunks.clone()))
            .unwrap();

        encoder.start().unwrap();
        encoder.request_data();
        encoder.pause();
        encoder.request_data();
        encoder.resume();
        encoder.stop().unwrap();
        encoder.request_data();

        assert_eq!(*chunks.lock(), vec![10, 3]);
    }

    #[test]
    fn denial_updates_introspection() {
        let capture = SimCaptureProvider::new();
        capture.set_decision(AccessDecision::Deny);
        assert!(capture.open_stream(&StreamConstraints::access_check()).is_err());
        assert_eq!(capture.query_permission(), Some(PermissionStatus::Denied));

        capture.set_introspection(None);
        capture.set_decision(AccessDecision::Allow);
        capture.open_stream(&StreamConstraints::access_check()).unwrap();
        assert_eq!(capture.query_permission(), None);
    }

    #[test]
    fn player_ends_once() {
        let provider = SimPlaybackProvider::new();
        let ended = Arc::new(Mutex::new(0));
        let e = ended.clone();
        let source = PlayableSource {
            artifact_ref: "a".into(),
            url: "blob:voice-journal/x".into(),
            encoding: EncodingDescriptor::new("audio/webm"),
            duration_secs: 1.0,
            bytes: Arc::from(&b"abc"[..]),
        };
        let player = provider
            .create_player(&source, PlayerEvents {
                on_ended: Arc::new(move || *e.lock() += 1),
                on_error: Arc::new(|_| {}),
            })
            .unwrap();
        player.play().unwrap();

        let sim = provider.last_player().unwrap();
        sim.finish();
        sim.finish();
        assert_eq!(*ended.lock(), 1);
        assert_eq!(sim.state(), SimPlayerState::Ended);
    }
}
