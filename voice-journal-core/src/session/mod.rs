pub mod capture;
pub mod permission_gate;
pub mod playback;
pub mod scheduler;
pub mod visualizer;
