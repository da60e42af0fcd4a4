//! Waveform geometry and level metering over analyser output.
//!
//! The analyser delivers unsigned 8-bit time-domain samples where 128 is
//! silence. All functions here are pure.

use crate::models::audio_models::{WaveformLevels, WavePoint};

/// Centre value of an unsigned 8-bit time-domain sample.
pub const SILENCE: u8 = 128;

/// Map time-domain samples onto a `width` x `height` surface.
///
/// Sample `i` lands at `x = i * width / n`, `y = (sample / 128) * height / 2`,
/// and the trace is closed at `(width, height / 2)`.
pub fn trace(samples: &[u8], width: u32, height: u32) -> Vec<WavePoint> {
    let width = width as f32;
    let height = height as f32;
    let mut points = Vec::with_capacity(samples.len() + 1);

    if !samples.is_empty() {
        let slice_width = width / samples.len() as f32;
        let mut x = 0.0f32;
        for &sample in samples {
            let v = sample as f32 / SILENCE as f32;
            points.push(WavePoint { x, y: v * height / 2.0 });
            x += slice_width;
        }
    }

    points.push(WavePoint {
        x: width,
        y: height / 2.0,
    });
    points
}

/// Convert an 8-bit time-domain sample to a signed amplitude in [-1.0, 1.0).
#[inline]
pub fn amplitude(sample: u8) -> f32 {
    (sample as f32 - SILENCE as f32) / SILENCE as f32
}

/// Compute RMS level of 8-bit time-domain samples.
pub fn rms_level(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| amplitude(s) * amplitude(s)).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of 8-bit time-domain samples.
pub fn peak_level(samples: &[u8]) -> f32 {
    samples.iter().map(|&s| amplitude(s).abs()).fold(0.0f32, f32::max)
}

pub fn levels(samples: &[u8]) -> WaveformLevels {
    WaveformLevels {
        level: rms_level(samples),
        peak: peak_level(samples),
    }
}
