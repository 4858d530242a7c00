use std::{collections::BTreeMap, path::Path};

use anyhow::bail;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    location::Coordinate,
    pinset::{Pin, Pinset, orphan_names},
    prelude::*,
    repository::{AddedPin, PinRepository},
    settings::SettingKey,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Everything a [MemoryRepository] holds, used to persist it between runs
pub struct RepositorySnapshot {
    pub pinsets: Vec<Pinset>,
    pub settings: BTreeMap<String, String>,
}

impl Default for RepositorySnapshot {
    fn default() -> Self {
        let settings = SettingKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), key.default_value().to_string()))
            .collect();
        Self {
            pinsets: vec![],
            settings,
        }
    }
}

impl RepositorySnapshot {
    fn get(&self, name: &str) -> Option<&Pinset> {
        self.pinsets.iter().find(|set| set.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Pinset> {
        self.pinsets
            .iter_mut()
            .find(|set| set.name == name)
            .with_context(|| format!("Pinset \"{name}\" doesn't exist"))
    }

    fn next_pinset_name(&self) -> String {
        (1..)
            .map(|n| format!("Pinset {n}"))
            .find(|name| self.get(name).is_none())
            .unwrap_or_default()
    }
}

fn next_pin_name(set: &Pinset) -> String {
    (set.pins.len() + 1..)
        .map(|n| format!("Pin {n}"))
        .find(|name| set.get_pin(name).is_none())
        .unwrap_or_default()
}

/// [PinRepository] that keeps everything in memory, optionally saved to a JSON file
#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<RepositorySnapshot>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }

    pub async fn snapshot(&self) -> RepositorySnapshot {
        self.data.read().await.clone()
    }

    /// Add or replace a whole pinset
    pub async fn insert_pinset(&self, pinset: Pinset) {
        let mut data = self.data.write().await;
        data.pinsets.retain(|set| set.name != pinset.name);
        data.pinsets.push(pinset);
    }

    /// Mark a pinset as published (or not)
    pub async fn set_cloud_id(&self, name: &str, cloud_id: Option<String>) -> Result {
        let mut data = self.data.write().await;
        data.get_mut(name)?.cloud_id = cloud_id;
        Ok(())
    }

    pub async fn get_pin(&self, pinset_name: &str, pin_name: &str) -> Option<Pin> {
        self.data
            .read()
            .await
            .get(pinset_name)
            .and_then(|set| set.get_pin(pin_name).cloned())
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read store at {}", path.display()))?;
        let snapshot =
            serde_json::from_slice(&raw).context("Failed to deserialize pinset store")?;
        info!("Loaded pinset store from {}", path.display());
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result {
        let path = path.as_ref();
        let encoded = serde_json::to_vec_pretty(&*self.data.read().await)
            .context("Failed to serialize pinset store")?;
        tokio::fs::write(path, encoded)
            .await
            .with_context(|| format!("Failed to write store to {}", path.display()))
    }
}

impl PinRepository for MemoryRepository {
    async fn list_pinsets(&self) -> Result<Vec<Pinset>> {
        Ok(self.data.read().await.pinsets.clone())
    }

    async fn get_pinset(&self, name: &str) -> Result<Option<Pinset>> {
        Ok(self.data.read().await.get(name).cloned())
    }

    async fn add_pin(
        &self,
        coord: Coordinate,
        create_new_pinset: bool,
        last_pinset_name: &str,
    ) -> Result<AddedPin> {
        let mut data = self.data.write().await;

        let set = if create_new_pinset {
            let name = data.next_pinset_name();
            data.pinsets.push(Pinset::new(name));
            data.pinsets
                .last_mut()
                .context("Pinset vanished right after insert")?
        } else {
            if last_pinset_name.is_empty() {
                bail!("No pinset given to add the pin to");
            }
            data.get_mut(last_pinset_name)?
        };

        let pin_name = next_pin_name(set);
        set.pins.push(Pin::at(pin_name.clone(), coord));
        debug!("Added {pin_name} to {}", set.name);

        Ok(AddedPin {
            pinset_name: set.name.clone(),
            pin_name,
        })
    }

    async fn set_pinset_visibility(&self, name: &str, visible: bool) -> Result {
        self.data.write().await.get_mut(name)?.visible = visible;
        Ok(())
    }

    async fn rename_pinset(&self, old_name: &str, new_name: &str) -> Result {
        let mut data = self.data.write().await;
        if new_name.trim().is_empty() {
            bail!("Pinset name can't be empty");
        }
        if old_name != new_name && data.get(new_name).is_some() {
            bail!("A pinset named \"{new_name}\" already exists");
        }
        data.get_mut(old_name)?.name = new_name.to_string();
        debug!("Renamed pinset {old_name} to {new_name}");
        Ok(())
    }

    async fn delete_pin(&self, pinset_name: &str, pin_name: &str) -> Result {
        let mut data = self.data.write().await;
        let set = data.get_mut(pinset_name)?;
        let before = set.pins.len();
        set.pins.retain(|pin| pin.name != pin_name);
        if set.pins.len() == before {
            bail!("Pin \"{pin_name}\" doesn't exist in \"{pinset_name}\"");
        }
        Ok(())
    }

    async fn delete_orphan_pinsets(&self) -> Result<bool> {
        let mut data = self.data.write().await;
        let orphans = orphan_names(&data.pinsets);
        if orphans.is_empty() {
            return Ok(false);
        }
        data.pinsets.retain(|set| !set.is_orphan());
        info!("Deleted empty pinsets: {}", orphans.join(", "));
        Ok(true)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.settings.get(key).cloned())
    }

    async fn update_setting(&self, key: &str, value: &str) -> Result {
        self.data
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
