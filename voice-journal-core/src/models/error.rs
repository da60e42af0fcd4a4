use thiserror::Error;

/// Reasons capture authorization can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("capture requires a secure context")]
    InsecureContext,

    #[error("audio capture is not supported on this platform")]
    UnsupportedPlatform,

    #[error("microphone permission denied")]
    Denied,
}

/// Capture hardware failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no capture device found")]
    NotFound,

    #[error("capture device is busy")]
    Busy,

    #[error("capture device disconnected mid-session: {0}")]
    Disconnected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("no supported encoding format")]
    NoSupportedFormat,

    #[error("encoder failed: {0}")]
    EncoderFailed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("failed to decode audio: {0}")]
    DecodeFailure(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("read failed: {0}")]
    ReadFailure(String),

    #[error("write failed: {0}")]
    WriteFailure(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Errors surfaced by the voice-journal pipeline.
///
/// Every fallible operation in this crate returns this type. The category
/// enums convert into it with `?`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("a capture session is already active")]
    SessionAlreadyActive,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}
