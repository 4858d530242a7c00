use serde::{Deserialize, Serialize};

use crate::{prelude::*, repository::PinRepository};

const YES: &str = "yes";
const NO: &str = "no";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// User settings stored in the repository as "yes"/"no" strings
pub enum SettingKey {
    /// Every new pin starts its own pinset instead of joining the last one
    CreateNewSetForNewPin,
    /// Show the device's location dot on the map
    ShowLocationOnMap,
}

impl SettingKey {
    pub const ALL: [Self; 2] = [Self::CreateNewSetForNewPin, Self::ShowLocationOnMap];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateNewSetForNewPin => "createNewSetForNewPin",
            Self::ShowLocationOnMap => "showLocationOnMap",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            Self::CreateNewSetForNewPin => NO,
            Self::ShowLocationOnMap => YES,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

pub fn flag_value(on: bool) -> &'static str {
    if on { YES } else { NO }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Settings that affect the map screen
pub struct MapSettings {
    pub create_new_set_for_new_pin: bool,
    pub show_location_on_map: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            create_new_set_for_new_pin: SettingKey::CreateNewSetForNewPin.default_value() == YES,
            show_location_on_map: SettingKey::ShowLocationOnMap.default_value() == YES,
        }
    }
}

impl MapSettings {
    pub async fn load(repo: &impl PinRepository) -> Result<Self> {
        Ok(Self {
            create_new_set_for_new_pin: read_flag(repo, SettingKey::CreateNewSetForNewPin).await?,
            show_location_on_map: read_flag(repo, SettingKey::ShowLocationOnMap).await?,
        })
    }

    pub async fn save(&self, repo: &impl PinRepository) -> Result {
        repo.update_setting(
            SettingKey::CreateNewSetForNewPin.as_str(),
            flag_value(self.create_new_set_for_new_pin),
        )
        .await?;
        repo.update_setting(
            SettingKey::ShowLocationOnMap.as_str(),
            flag_value(self.show_location_on_map),
        )
        .await
    }
}

async fn read_flag(repo: &impl PinRepository, key: SettingKey) -> Result<bool> {
    let value = repo
        .get_setting(key.as_str())
        .await
        .with_context(|| format!("Failed to read setting {}", key.as_str()))?;
    Ok(value.as_deref().unwrap_or(key.default_value()) == YES)
}
