use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use pinset_logic::{
    AcquisitionProgress, AuthorizationState, Coordinate, MapPin, Notice, Pinset, PlacementOutcome,
    SettingKey,
};
use serde::{Deserialize, Serialize};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Things the simulated device does on its own
pub enum PlatformRequest {
    /// The user answered the permission prompt, or changed it in system settings
    SetAuthorization(AuthorizationState),
    /// Move the device, delivers a fix if updates are running
    MoveTo(Coordinate),
    /// Make the platform report a failure to get a fix
    Fail(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Things the user does on the map screen
pub enum MapRequest {
    Activate,
    Deactivate,
    PlaceHere,
    PlaceAt(Coordinate),
    FindMe,
    SelectPin { pinset_name: String, pin_name: String },
    DeletePin { pinset_name: String, pin_name: String },
    DeleteLastPin,
    RenamePinset { old_name: String, new_name: String },
    /// Show a web link to the last pin
    ShareLastPin,
    SetSetting(SettingKey, bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingRequest {
    Platform(PlatformRequest),
    Map(MapRequest),
    ListPinsets,
    /// Write the repository out to the daemon's store file
    Save,
}

impl From<PlatformRequest> for TestingRequest {
    fn from(val: PlatformRequest) -> Self {
        TestingRequest::Platform(val)
    }
}

impl From<MapRequest> for TestingRequest {
    fn from(val: MapRequest) -> Self {
        TestingRequest::Map(val)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TestingResponse {
    Complete,
    Progress(AcquisitionProgress),
    /// The system permission prompt is showing, answer it with [PlatformRequest::SetAuthorization]
    PermissionPrompted,
    Notice(Notice),
    PinsRendered(Vec<MapPin>),
    Recentered(Coordinate),
    DestinationLabel(String),
    UserLocationShown(bool),
    Placed(PlacementOutcome),
    Pinsets(Vec<Pinset>),
    Error(String),
}

impl From<anyhow::Error> for TestingResponse {
    fn from(value: anyhow::Error) -> Self {
        TestingResponse::Error(format!("{value:#}"))
    }
}

impl From<Notice> for TestingResponse {
    fn from(val: Notice) -> Self {
        TestingResponse::Notice(val)
    }
}

impl From<AcquisitionProgress> for TestingResponse {
    fn from(val: AcquisitionProgress) -> Self {
        TestingResponse::Progress(val)
    }
}

impl From<PlacementOutcome> for TestingResponse {
    fn from(val: PlacementOutcome) -> Self {
        TestingResponse::Placed(val)
    }
}

impl From<Vec<Pinset>> for TestingResponse {
    fn from(val: Vec<Pinset>) -> Self {
        TestingResponse::Pinsets(val)
    }
}
