/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording ↔ paused
///            ↓         ↓
///          stopped ← ──┘
/// ```
/// A device error at any point discards the session and returns to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording { elapsed_secs: u64 },
    Paused { elapsed_secs: u64 },
    Stopped { elapsed_secs: u64 },
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Recording or paused: the session holds the device stream.
    pub fn is_active(&self) -> bool {
        self.is_recording() || self.is_paused()
    }

    pub fn elapsed_secs(&self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Recording { elapsed_secs }
            | Self::Paused { elapsed_secs }
            | Self::Stopped { elapsed_secs } => *elapsed_secs,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording { .. } => "recording",
            Self::Paused { .. } => "paused",
            Self::Stopped { .. } => "stopped",
        }
    }
}
