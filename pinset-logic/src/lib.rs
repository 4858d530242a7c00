mod acquisition;
mod location;
mod memory;
mod notify;
mod orchestrator;
mod permission;
mod pinset;
mod policy;
mod render;
mod repository;
mod settings;

pub use acquisition::{
    AcquisitionConfig, AcquisitionProgress, CoordinateSource, LocationAcquisitionService,
    ProgressSender,
};
pub use location::{
    AuthorizationState, CANNOT_GET_LOCATION, Coordinate, LocationError, LocationEvent,
    LocationSource, TIMEOUT_MESSAGE,
};
pub use memory::{MemoryRepository, RepositorySnapshot};
pub use notify::{
    Notice, NoticeIcon, Notifier, PIN_ALREADY_EXISTS, PIN_DELETED, REMOVED_EMPTY_PINSET,
    SHARE_LINK_TITLE,
};
pub use orchestrator::{PlacementError, PlacementOrchestrator, PlacementOutcome, PlacementSession};
pub use permission::PermissionGate;
pub use pinset::{Pin, PinStyle, Pinset, orphan_names};
pub use policy::{PinPlacementPolicy, PlacementDecision};
pub use render::{
    MapPin, MapRenderer, NEW_SET_PLACEHOLDER, PIN_LOCATOR_URL, destination_label, map_link,
    map_pins,
};
pub use repository::{AddedPin, PinRepository};
pub use settings::{MapSettings, SettingKey, flag_value};

use chrono::{DateTime, Utc};

pub type UtcDT = DateTime<Utc>;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
