//! Camera permission seam
//!
//! The core only needs to know whether access was granted. Remediation
//! prompts (opening settings, alerts) belong to the surrounding UI.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

pub trait PermissionProvider {
    fn status(&self) -> PermissionStatus;

    /// Ask the user; returns whether access was granted
    fn request(&self) -> bool;
}

/// Resolve the current permission, prompting once if undetermined
pub fn ensure_granted(provider: &dyn PermissionProvider) -> Result<(), PermissionStatus> {
    match provider.status() {
        PermissionStatus::Authorized => Ok(()),
        PermissionStatus::NotDetermined => {
            if provider.request() {
                Ok(())
            } else {
                Err(PermissionStatus::Denied)
            }
        }
        denied => Err(denied),
    }
}

/// Fixed answer; used by headless hosts where the camera is a file replay
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionStatus);

impl PermissionProvider for StaticPermission {
    fn status(&self) -> PermissionStatus {
        self.0
    }

    fn request(&self) -> bool {
        self.0 == PermissionStatus::Authorized
    }
}
