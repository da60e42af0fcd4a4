use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{SourceMode, WaveformLevels};
use crate::models::error::JournalError;
use crate::processing::waveform;
use crate::session::scheduler::{Scheduler, TimerId};
use crate::traits::audio_graph::{AudioGraph, AudioGraphProvider, DrawingSurface, SourceHandle};

/// Render-loop state shared between the session and its frame timer.
struct FrameState {
    graph: Box<dyn AudioGraph>,
    samples: Vec<u8>,
    closed: bool,
}

/// One live attachment of the analyser to one audio source.
struct VisualizerSession {
    mode: SourceMode,
    source_id: String,
    render_timer: TimerId,
    frame: Arc<Mutex<FrameState>>,
}

/// Attach/detach/frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualizerStats {
    pub attaches: u64,
    pub detaches: u64,
    pub frames_rendered: u64,
}

#[derive(Default)]
struct Telemetry {
    stats: VisualizerStats,
    levels: WaveformLevels,
}

/// Renders a live waveform from exactly one source at a time.
///
/// Shared by the capture manager and the playback controller. Attaching
/// always detaches the previous session first, so at most one audio graph
/// and one render loop exist.
pub struct AudioVisualizer {
    graphs: Arc<dyn AudioGraphProvider>,
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<Mutex<Box<dyn DrawingSurface>>>,
    fft_size: usize,
    frame_interval: std::time::Duration,
    session: Mutex<Option<VisualizerSession>>,
    telemetry: Arc<Mutex<Telemetry>>,
}

impl AudioVisualizer {
    pub fn new(
        graphs: Arc<dyn AudioGraphProvider>,
        scheduler: Arc<dyn Scheduler>,
        surface: Box<dyn DrawingSurface>,
        fft_size: usize,
        frame_interval: std::time::Duration,
    ) -> Self {
        Self {
            graphs,
            scheduler,
            surface: Arc::new(Mutex::new(surface)),
            fft_size,
            frame_interval,
            session: Mutex::new(None),
            telemetry: Arc::new(Mutex::new(Telemetry::default())),
        }
    }

    /// Bind the analyser to `source` and start the render loop.
    ///
    /// Any attached session is fully torn down before the new graph is
    /// created.
    pub fn attach(&self, source: SourceHandle) -> Result<(), JournalError> {
        self.detach();

        let mut graph = self.graphs.create_graph()?;
        if let Err(e) = graph.connect_analyser(&source, self.fft_size) {
            graph.close();
            return Err(e);
        }

        let frame = Arc::new(Mutex::new(FrameState {
            graph,
            samples: vec![waveform::SILENCE; self.fft_size],
            closed: false,
        }));

        let render_frame = Arc::clone(&frame);
        let surface = Arc::clone(&self.surface);
        let telemetry = Arc::clone(&self.telemetry);
        let render_timer = self.scheduler.schedule_repeating(
            self.frame_interval,
            Arc::new(move || render(&render_frame, &surface, &telemetry)),
        );

        let mode = source.mode();
        let source_id = source.id().to_string();
        log::debug!("Visualizer attached to {:?} source {}", mode, source_id);

        *self.session.lock() = Some(VisualizerSession {
            mode,
            source_id,
            render_timer,
            frame,
        });
        self.telemetry.lock().stats.attaches += 1;
        Ok(())
    }

    /// Cancel the render loop, disconnect the analyser, close the graph and
    /// clear the surface. A no-op when nothing is attached.
    pub fn detach(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        self.scheduler.cancel(session.render_timer);
        {
            let mut frame = session.frame.lock();
            frame.closed = true;
            frame.graph.disconnect();
            frame.graph.close();
        }
        self.surface.lock().clear();

        let mut telemetry = self.telemetry.lock();
        telemetry.stats.detaches += 1;
        telemetry.levels = WaveformLevels::default();
        log::debug!("Visualizer detached from {:?} source {}", session.mode, session.source_id);
    }

    pub fn is_attached(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Mode of the attached source, if any.
    pub fn mode(&self) -> Option<SourceMode> {
        self.session.lock().as_ref().map(|s| s.mode)
    }

    /// Identifier of the attached stream or player, if any.
    pub fn source_id(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.source_id.clone())
    }

    /// Levels from the most recent frame.
    pub fn levels(&self) -> WaveformLevels {
        self.telemetry.lock().levels
    }

    pub fn stats(&self) -> VisualizerStats {
        self.telemetry.lock().stats
    }
}

impl Drop for AudioVisualizer {
    fn drop(&mut self) {
        self.detach();
    }
}

/// One render-loop frame: sample the waveform and redraw it.
fn render(
    frame: &Mutex<FrameState>,
    surface: &Mutex<Box<dyn DrawingSurface>>,
    telemetry: &Mutex<Telemetry>,
) {
    let mut frame = frame.lock();
    if frame.closed {
        return;
    }
    let FrameState { graph, samples, .. } = &mut *frame;
    graph.time_domain_data(samples);

    let levels = waveform::levels(samples);
    {
        let mut surface = surface.lock();
        let (width, height) = surface.size();
        let points = waveform::trace(samples, width, height);
        surface.clear();
        surface.stroke_polyline(&points);
    }

    let mut telemetry = telemetry.lock();
    telemetry.levels = levels;
    telemetry.stats.frames_rendered += 1;
}
