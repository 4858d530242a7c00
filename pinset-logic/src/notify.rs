use serde::{Deserialize, Serialize};

use crate::location::LocationError;

pub const PIN_ALREADY_EXISTS: &str = "Pin already exists at that location";
pub const REMOVED_EMPTY_PINSET: &str = "Removed empty pinset";
pub const PIN_DELETED: &str = "Pin deleted";
pub const SHARE_LINK_TITLE: &str = "Copy this hyperlink";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
pub enum NoticeIcon {
    Warning,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Something the user needs to be told
pub enum Notice {
    /// Modal telling the user to enable location access, with a shortcut to system settings
    EnableLocation,
    /// Dismissable alert
    Alert { title: String, message: String },
    /// Non-blocking message that slides in over the map
    Inline { message: String, icon: NoticeIcon },
}

impl Notice {
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Alert {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Inline {
            message: message.into(),
            icon: NoticeIcon::Warning,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::Inline {
            message: message.into(),
            icon: NoticeIcon::Success,
        }
    }

    /// How a failed location request is shown, `None` when there's nothing to tell the user
    pub fn for_location_error(err: &LocationError) -> Option<Self> {
        match err {
            LocationError::PermissionRequired => Some(Self::EnableLocation),
            LocationError::AcquisitionFailed(msg) => Some(Self::alert("Error", msg.clone())),
            LocationError::Superseded => None,
        }
    }
}

/// Shows [Notice]s to the user
pub trait Notifier {
    fn notify(&self, notice: Notice);
}
