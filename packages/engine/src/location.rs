//! Seams to the host platform: device location and the map widget.

use async_trait::async_trait;
use locator_geocoder_models::Coordinates;

use crate::LocateError;

/// Result of a location permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The user allowed location access.
    Granted,
    /// The user refused; search stays disabled until a retry succeeds.
    Denied,
}

/// Device location service.
#[async_trait]
pub trait LocationService: Send + Sync {
    /// Prompts for (or checks) foreground location permission.
    async fn request_permission(&self) -> Permission;

    /// Reads the current position.
    ///
    /// # Errors
    ///
    /// * [`LocateError::PositionUnavailable`] if no fix can be obtained
    async fn current_position(&self) -> Result<Coordinates, LocateError>;
}

/// The map widget. The host reports pan-settle events back through
/// [`crate::session::LocationSession::on_region_settled`].
pub trait MapView: Send + Sync {
    /// Moves the map to `target` at `zoom`.
    fn animate_to(&self, target: Coordinates, zoom: f64);
}
