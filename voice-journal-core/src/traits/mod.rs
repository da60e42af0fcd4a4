pub mod audio_graph;
pub mod capture_delegate;
pub mod capture_provider;
pub mod encoder;
pub mod encryptor;
pub mod persisted_store;
pub mod playback_delegate;
pub mod player;
pub mod transcriber;
