use serde::{Deserialize, Serialize};

use crate::location::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// How every pin in a pinset is drawn
pub enum PinStyle {
    /// Drawn as the given emoji
    Emoji(String),
    /// Drawn as a classic map pin of the given color
    Pin(String),
}

impl Default for PinStyle {
    fn default() -> Self {
        Self::Pin("red".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
/// A single point of interest
pub struct Pin {
    /// Unique within the owning pinset
    pub name: String,
    /// Stored as a decimal string
    pub lat: String,
    /// Stored as a decimal string
    pub lng: String,
    pub description: String,
    /// File name of an attached photo
    pub photo: Option<String>,
}

impl Pin {
    pub fn at(name: impl Into<String>, coord: Coordinate) -> Self {
        Self {
            name: name.into(),
            lat: coord.lat_string(),
            lng: coord.lng_string(),
            description: String::new(),
            photo: None,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::parse(&self.lat, &self.lng)
    }

    /// Exact match on the stored strings, no float comparison
    pub fn is_at(&self, lat: &str, lng: &str) -> bool {
        self.lat == lat && self.lng == lng
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
/// A named group of pins sharing a style
pub struct Pinset {
    /// Globally unique
    pub name: String,
    pub visible: bool,
    pub style: PinStyle,
    /// Set once the pinset was published to the cloud
    pub cloud_id: Option<String>,
    pub pins: Vec<Pin>,
}

impl Pinset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            style: PinStyle::default(),
            cloud_id: None,
            pins: vec![],
        }
    }

    /// Published pinsets can't have new pins added to them from the map
    pub fn is_published(&self) -> bool {
        self.cloud_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// A pinset with no pins left, due for deletion
    pub fn is_orphan(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn get_pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn find_pin_at(&self, lat: &str, lng: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.is_at(lat, lng))
    }
}

/// Names of every orphan in the given pinsets
pub fn orphan_names(pinsets: &[Pinset]) -> Vec<String> {
    pinsets
        .iter()
        .filter(|set| set.is_orphan())
        .map(|set| set.name.clone())
        .collect()
}
