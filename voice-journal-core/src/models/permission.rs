use serde::{Deserialize, Serialize};

/// Microphone authorization as last observed by the permission gate.
///
/// ```text
/// unknown → granted / denied / prompt   (query)
/// prompt  → granted / denied            (request)
/// denied  → granted                     (explicit request only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Unknown,
    Granted,
    Denied,
    Prompt,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl Default for PermissionStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Whether the host can capture audio at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportReport {
    pub is_supported: bool,
    pub is_secure_context: bool,
}

impl SupportReport {
    /// A report that rejects capture outright.
    pub fn unsupported() -> Self {
        Self {
            is_supported: false,
            is_secure_context: false,
        }
    }
}
