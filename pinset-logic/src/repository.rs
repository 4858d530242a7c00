use serde::{Deserialize, Serialize};

use crate::{
    location::Coordinate,
    pinset::{Pin, Pinset},
    prelude::*,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Where [PinRepository::add_pin] put the new pin
pub struct AddedPin {
    pub pinset_name: String,
    pub pin_name: String,
}

/// Storage for pinsets, pins and user settings.
///
/// Each call is expected to be atomic on its own, sequences of calls are not transactional.
pub trait PinRepository {
    /// Every pinset, with its pins
    fn list_pinsets(&self) -> impl Future<Output = Result<Vec<Pinset>>>;

    fn get_pinset(&self, name: &str) -> impl Future<Output = Result<Option<Pinset>>>;

    fn pinset_exists(&self, name: &str) -> impl Future<Output = Result<bool>> {
        async move { Ok(self.get_pinset(name).await?.is_some()) }
    }

    /// Whether the pinset has been published, `false` if it doesn't exist
    fn pinset_has_cloud_id(&self, name: &str) -> impl Future<Output = Result<bool>> {
        async move {
            Ok(self
                .get_pinset(name)
                .await?
                .is_some_and(|set| set.is_published()))
        }
    }

    /// Look for a pin stored with exactly these coordinate strings
    fn find_pin_by_coordinate(
        &self,
        pinset_name: &str,
        lat: &str,
        lng: &str,
    ) -> impl Future<Output = Result<Option<Pin>>> {
        async move {
            Ok(self
                .get_pinset(pinset_name)
                .await?
                .and_then(|set| set.find_pin_at(lat, lng).cloned()))
        }
    }

    /// Store a new pin at `coord`. With `create_new_pinset` a fresh, auto-named pinset is made
    /// for it, otherwise it goes into `last_pinset_name`. The repository names the pin.
    fn add_pin(
        &self,
        coord: Coordinate,
        create_new_pinset: bool,
        last_pinset_name: &str,
    ) -> impl Future<Output = Result<AddedPin>>;

    fn set_pinset_visibility(&self, name: &str, visible: bool) -> impl Future<Output = Result>;

    /// Fails if `old_name` doesn't exist or `new_name` is taken
    fn rename_pinset(&self, old_name: &str, new_name: &str) -> impl Future<Output = Result>;

    fn delete_pin(&self, pinset_name: &str, pin_name: &str) -> impl Future<Output = Result>;

    /// Delete every pinset without pins, returns whether any were removed
    fn delete_orphan_pinsets(&self) -> impl Future<Output = Result<bool>>;

    fn get_setting(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;

    fn update_setting(&self, key: &str, value: &str) -> impl Future<Output = Result>;
}

impl<R: PinRepository> PinRepository for std::sync::Arc<R> {
    fn list_pinsets(&self) -> impl Future<Output = Result<Vec<Pinset>>> {
        (**self).list_pinsets()
    }

    fn get_pinset(&self, name: &str) -> impl Future<Output = Result<Option<Pinset>>> {
        (**self).get_pinset(name)
    }

    fn pinset_exists(&self, name: &str) -> impl Future<Output = Result<bool>> {
        (**self).pinset_exists(name)
    }

    fn pinset_has_cloud_id(&self, name: &str) -> impl Future<Output = Result<bool>> {
        (**self).pinset_has_cloud_id(name)
    }

    fn find_pin_by_coordinate(
        &self,
        pinset_name: &str,
        lat: &str,
        lng: &str,
    ) -> impl Future<Output = Result<Option<Pin>>> {
        (**self).find_pin_by_coordinate(pinset_name, lat, lng)
    }

    fn add_pin(
        &self,
        coord: Coordinate,
        create_new_pinset: bool,
        last_pinset_name: &str,
    ) -> impl Future<Output = Result<AddedPin>> {
        (**self).add_pin(coord, create_new_pinset, last_pinset_name)
    }

    fn set_pinset_visibility(&self, name: &str, visible: bool) -> impl Future<Output = Result> {
        (**self).set_pinset_visibility(name, visible)
    }

    fn rename_pinset(&self, old_name: &str, new_name: &str) -> impl Future<Output = Result> {
        (**self).rename_pinset(old_name, new_name)
    }

    fn delete_pin(&self, pinset_name: &str, pin_name: &str) -> impl Future<Output = Result> {
        (**self).delete_pin(pinset_name, pin_name)
    }

    fn delete_orphan_pinsets(&self) -> impl Future<Output = Result<bool>> {
        (**self).delete_orphan_pinsets()
    }

    fn get_setting(&self, key: &str) -> impl Future<Output = Result<Option<String>>> {
        (**self).get_setting(key)
    }

    fn update_setting(&self, key: &str, value: &str) -> impl Future<Output = Result> {
        (**self).update_setting(key, value)
    }
}
