pub mod artifact;
pub mod audio_models;
pub mod config;
pub mod entry;
pub mod error;
pub mod permission;
pub mod state;
