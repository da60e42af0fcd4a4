use std::sync::Arc;

use crate::models::audio_models::{SourceMode, WavePoint};
use crate::models::error::JournalError;
use crate::traits::capture_provider::MediaStream;
use crate::traits::player::Player;

/// The one audio source a visualizer session analyses.
#[derive(Clone)]
pub enum SourceHandle {
    Capture(Arc<dyn MediaStream>),
    Playback(Arc<dyn Player>),
}

impl SourceHandle {
    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Capture(_) => SourceMode::Capture,
            Self::Playback(_) => SourceMode::Playback,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Capture(stream) => stream.id(),
            Self::Playback(player) => player.id(),
        }
    }
}

/// An audio-processing graph with a single amplitude analyser.
pub trait AudioGraph: Send {
    /// Connect the analyser to `source`. A graph analyses one source at a time.
    fn connect_analyser(
        &mut self,
        source: &SourceHandle,
        fft_size: usize,
    ) -> Result<(), JournalError>;

    /// Fill `out` with unsigned 8-bit time-domain samples (128 = silence).
    fn time_domain_data(&mut self, out: &mut [u8]);

    /// Disconnect the analyser from its source. Idempotent.
    fn disconnect(&mut self);

    /// Release the graph. Idempotent.
    fn close(&mut self);
}

pub trait AudioGraphProvider: Send + Sync {
    fn create_graph(&self) -> Result<Box<dyn AudioGraph>, JournalError>;
}

/// The drawing target for waveform frames.
pub trait DrawingSurface: Send {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    fn clear(&mut self);

    fn stroke_polyline(&mut self, points: &[WavePoint]);
}
