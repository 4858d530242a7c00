use crate::location::AuthorizationState;

/// Reads and requests location authorization from the platform.
///
/// Requesting permission never returns an answer directly, the outcome shows up later as a
/// [crate::LocationEvent::AuthorizationChanged] delivered to the
/// [crate::LocationAcquisitionService]. If the user never answers nothing happens.
pub trait PermissionGate {
    /// Current authorization, no side effects
    fn check_status(&self) -> AuthorizationState;
    /// Show the platform's permission prompt
    fn request_permission(&self);
}

impl<G: PermissionGate + ?Sized> PermissionGate for std::sync::Arc<G> {
    fn check_status(&self) -> AuthorizationState {
        (**self).check_status()
    }

    fn request_permission(&self) {
        (**self).request_permission()
    }
}
