pub mod text_heuristics;
pub mod waveform;
