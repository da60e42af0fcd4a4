use std::sync::Arc;

use crate::models::error::JournalError;
use crate::storage::artifact_vault::PlayableSource;

/// Callback invoked when playback reaches the end of the source.
pub type EndedCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Callback invoked when playback fails.
pub type PlayerErrorCallback = Arc<dyn Fn(JournalError) + Send + Sync + 'static>;

/// Callbacks registered with a player at creation.
#[derive(Clone)]
pub struct PlayerEvents {
    pub on_ended: EndedCallback,
    pub on_error: PlayerErrorCallback,
}

/// A playback element bound to one playable source.
pub trait Player: Send + Sync {
    fn id(&self) -> &str;

    fn play(&self) -> Result<(), JournalError>;

    fn pause(&self);

    fn resume(&self) -> Result<(), JournalError>;

    /// Stop and release the element. Does not fire `on_ended`.
    fn stop(&self);
}

pub trait PlaybackProvider: Send + Sync {
    fn create_player(
        &self,
        source: &PlayableSource,
        events: PlayerEvents,
    ) -> Result<Arc<dyn Player>, JournalError>;
}
