use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::StreamConstraints;
use crate::models::error::{JournalError, PermissionError};
use crate::models::permission::{PermissionStatus, SupportReport};
use crate::traits::capture_provider::CaptureProvider;

/// Tracks microphone authorization and escalates to the platform prompt.
///
/// A `Denied` status only changes through `request_access`; queries never
/// overwrite it.
pub struct PermissionGate {
    provider: Arc<dyn CaptureProvider>,
    status: Mutex<PermissionStatus>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            provider,
            status: Mutex::new(PermissionStatus::Unknown),
        }
    }

    /// Whether capture is possible on this host. No side effects.
    pub fn check_support(&self) -> SupportReport {
        self.provider.check_support()
    }

    /// Best-effort read of the platform's permission state.
    ///
    /// Returns `Unknown` when the platform offers no introspection.
    pub fn query_permission(&self) -> PermissionStatus {
        let observed = self
            .provider
            .query_permission()
            .unwrap_or(PermissionStatus::Unknown);

        let mut status = self.status.lock();
        if *status == PermissionStatus::Denied {
            return PermissionStatus::Denied;
        }
        *status = observed;
        observed
    }

    /// Prompt for access by opening and immediately releasing a throwaway stream.
    ///
    /// A refusal is a result, not an error: it returns `Ok(Denied)`. Hardware
    /// problems come back as `DeviceError` and leave the status unchanged.
    pub fn request_access(&self) -> Result<PermissionStatus, JournalError> {
        let support = self.check_support();
        if !support.is_secure_context {
            return Err(PermissionError::InsecureContext.into());
        }
        if !support.is_supported {
            return Err(PermissionError::UnsupportedPlatform.into());
        }

        let result = match self.provider.open_stream(&StreamConstraints::access_check()) {
            Ok(stream) => {
                stream.stop_tracks();
                PermissionStatus::Granted
            }
            Err(JournalError::Permission(PermissionError::Denied)) => PermissionStatus::Denied,
            Err(e) => {
                log::warn!("Permission request failed: {}", e);
                return Err(e);
            }
        };

        let previous = std::mem::replace(&mut *self.status.lock(), result);
        if previous != result {
            log::info!("Microphone permission {:?} -> {:?}", previous, result);
        }
        Ok(result)
    }

    /// Succeed if access is granted, prompting when it is not yet known to be.
    pub fn ensure(&self) -> Result<(), JournalError> {
        if self.status().is_granted() {
            return Ok(());
        }
        match self.request_access()? {
            PermissionStatus::Granted => Ok(()),
            _ => Err(PermissionError::Denied.into()),
        }
    }

    /// Last known status.
    pub fn status(&self) -> PermissionStatus {
        *self.status.lock()
    }
}
