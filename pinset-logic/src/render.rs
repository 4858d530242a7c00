use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    location::Coordinate,
    pinset::{PinStyle, Pinset},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
/// A pin ready to be put on the map
pub struct MapPin {
    pub pinset_name: String,
    pub name: String,
    pub description: String,
    pub coordinate: Coordinate,
    pub style: PinStyle,
}

/// The map view, drawing itself is someone else's problem
pub trait MapRenderer {
    /// Replace every pin on the map with these
    fn render_all_pins(&self, pins: &[MapPin]);
    fn recenter(&self, coord: Coordinate);
    /// Text of the "next pin goes to" label
    fn show_destination_label(&self, label: &str);
    /// Show or hide the device's location dot
    fn show_user_location(&self, show: bool);
}

/// Pins of every visible pinset, skipping any whose stored coordinates don't parse
pub fn map_pins(pinsets: &[Pinset]) -> Vec<MapPin> {
    pinsets
        .iter()
        .filter(|set| set.visible)
        .flat_map(|set| {
            set.pins.iter().filter_map(move |pin| {
                let Some(coordinate) = pin.coordinate() else {
                    warn!(
                        "Skipping pin {} in {}, bad coordinate ({}, {})",
                        pin.name, set.name, pin.lat, pin.lng
                    );
                    return None;
                };
                Some(MapPin {
                    pinset_name: set.name.clone(),
                    name: pin.name.clone(),
                    description: pin.description.clone(),
                    coordinate,
                    style: set.style.clone(),
                })
            })
        })
        .collect()
}

pub const NEW_SET_PLACEHOLDER: &str = "<new set>";

/// Web page that drops a pin at the coordinates in its query string
pub const PIN_LOCATOR_URL: &str = "https://www.sharetheres.com/pinLocator.html";

/// Shareable link to a pin, built from its stored coordinate strings
pub fn map_link(lat: &str, lng: &str) -> String {
    format!("{PIN_LOCATOR_URL}?lat={lat}&lng={lng}")
}

pub fn destination_label(last_used: Option<&str>, prefers_always_new_set: bool) -> String {
    match last_used {
        Some(name) if !prefers_always_new_set => format!("Next pin goes to: {name}"),
        _ => format!("Next pin goes to: {NEW_SET_PLACEHOLDER}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pin;

    #[test]
    fn test_hidden_sets_and_bad_pins_skipped() {
        let mut shown = Pinset::new("Shown");
        shown.style = PinStyle::Emoji("🏕".to_string());
        shown.pins.push(Pin::at("Pin 1", Coordinate::new(1.0, 2.0)));
        let mut broken = Pin::at("Pin 2", Coordinate::new(0.0, 0.0));
        broken.lng = String::new();
        shown.pins.push(broken);

        let mut hidden = Pinset::new("Hidden");
        hidden.visible = false;
        hidden.pins.push(Pin::at("Pin 1", Coordinate::new(3.0, 4.0)));

        let pins = map_pins(&[shown, hidden]);
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].pinset_name, "Shown");
        assert_eq!(pins[0].coordinate, Coordinate::new(1.0, 2.0));
        assert_eq!(pins[0].style, PinStyle::Emoji("🏕".to_string()));
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            destination_label(Some("Trip"), false),
            "Next pin goes to: Trip"
        );
        assert_eq!(
            destination_label(Some("Trip"), true),
            "Next pin goes to: <new set>"
        );
        assert_eq!(destination_label(None, false), "Next pin goes to: <new set>");
    }

    #[test]
    fn test_map_link() {
        let pin = Pin::at("Pin 1", Coordinate::new(51.5074, -0.1278));
        assert_eq!(
            map_link(&pin.lat, &pin.lng),
            "https://www.sharetheres.com/pinLocator.html?lat=51.5074&lng=-0.1278"
        );
    }
}
