use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A "part" of a coordinate
pub type CoordinateComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// Some point in the world, either from the device's location services or tapped on the map
pub struct Coordinate {
    /// Latitude
    pub lat: CoordinateComponent,
    /// Longitude
    pub lng: CoordinateComponent,
}

impl Coordinate {
    pub fn new(lat: CoordinateComponent, lng: CoordinateComponent) -> Self {
        Self { lat, lng }
    }

    /// Latitude as it's stored on a pin.
    pub fn lat_string(&self) -> String {
        self.lat.to_string()
    }

    /// Longitude as it's stored on a pin.
    pub fn lng_string(&self) -> String {
        self.lng.to_string()
    }

    /// Parse a coordinate back out of the decimal strings stored on a pin
    pub fn parse(lat: &str, lng: &str) -> Option<Self> {
        let lat = lat.trim().parse().ok()?;
        let lng = lng.trim().parse().ok()?;
        Some(Self { lat, lng })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Location authorization as reported by the platform. Only ever changed by the OS or the user.
pub enum AuthorizationState {
    /// Parental controls or device policy block location access
    Restricted,
    /// The user said no
    Denied,
    /// The user hasn't been asked yet
    NotDetermined,
    AuthorizedAlways,
    AuthorizedWhenInUse,
}

impl AuthorizationState {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::AuthorizedAlways | Self::AuthorizedWhenInUse)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Restricted | Self::Denied)
    }
}

/// Message used when neither the platform nor the cache has a coordinate
pub const CANNOT_GET_LOCATION: &str = "Cannot get location";

/// Message used when a request gives up waiting on the platform
pub const TIMEOUT_MESSAGE: &str = "timeout";

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum LocationError {
    /// The user needs to go enable location access in system settings
    #[error("Location access is disabled")]
    PermissionRequired,
    /// The platform couldn't produce a fix, contains a message for the user
    #[error("{0}")]
    AcquisitionFailed(String),
    /// A newer request replaced this one before it settled
    #[error("Location request was replaced by a newer one")]
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Callbacks from the platform's location manager
pub enum LocationEvent {
    /// Authorization changed, also fired on its own when the app starts
    AuthorizationChanged(AuthorizationState),
    /// New fixes, the most recent one is last
    LocationsUpdated(Vec<Coordinate>),
    /// The platform failed to get a fix
    AcquisitionFailed(String),
}

/// The platform's continuous location subscription
pub trait LocationSource {
    /// Begin delivering [LocationEvent::LocationsUpdated] events
    fn start_updates(&self);
    /// Stop delivering updates
    fn stop_updates(&self);
    /// The platform's own idea of where the device is right now, if it has one
    fn current_location(&self) -> Option<Coordinate>;
}

impl<S: LocationSource + ?Sized> LocationSource for std::sync::Arc<S> {
    fn start_updates(&self) {
        (**self).start_updates()
    }

    fn stop_updates(&self) {
        (**self).stop_updates()
    }

    fn current_location(&self) -> Option<Coordinate> {
        (**self).current_location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_strings() {
        let coord = Coordinate::new(37.7749, -122.4194);
        assert_eq!(coord.lat_string(), "37.7749");
        assert_eq!(coord.lng_string(), "-122.4194");
        assert_eq!(Coordinate::new(10.0, 0.5).lat_string(), "10");
        assert_eq!(
            Coordinate::parse(&coord.lat_string(), &coord.lng_string()),
            Some(coord)
        );
    }

    #[test]
    fn test_bad_strings_dont_parse() {
        assert_eq!(Coordinate::parse("", "1.0"), None);
        assert_eq!(Coordinate::parse("north", "1.0"), None);
        assert_eq!(Coordinate::parse(" 1.5 ", "2"), Some(Coordinate::new(1.5, 2.0)));
    }
}
