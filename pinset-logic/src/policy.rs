use log::debug;
use serde::{Deserialize, Serialize};

use crate::{location::Coordinate, pinset::Pin, prelude::*, repository::PinRepository};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Where a freshly placed pin should go
pub enum PlacementDecision {
    /// Start a new pinset for the pin
    NewSet,
    /// Add the pin to the given (previously used) pinset
    AppendToPreviousSet(String),
    /// The previous pinset was published so it can't be appended to, a new set is made instead
    PreviousSetBlockedByCloud(String),
}

impl PlacementDecision {
    /// Whether carrying out this decision creates a new pinset
    pub fn creates_new_set(&self) -> bool {
        !matches!(self, Self::AppendToPreviousSet(_))
    }
}

/// Read-only rules deciding where pins go, backed by a [PinRepository] for liveness checks
pub struct PinPlacementPolicy<'a, R: PinRepository> {
    repo: &'a R,
}

impl<'a, R: PinRepository> PinPlacementPolicy<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    pub async fn decide(
        &self,
        last_used: Option<&str>,
        prefers_always_new_set: bool,
    ) -> Result<PlacementDecision> {
        let Some(prev) = last_used else {
            return Ok(PlacementDecision::NewSet);
        };

        // May have been deleted as an orphan since it was last used
        if !self.repo.pinset_exists(prev).await? {
            debug!("Last used pinset {prev} is gone");
            return Ok(PlacementDecision::NewSet);
        }

        if prefers_always_new_set {
            return Ok(PlacementDecision::NewSet);
        }

        // Read fresh, it may have been published since we last looked
        if self.repo.pinset_has_cloud_id(prev).await? {
            return Ok(PlacementDecision::PreviousSetBlockedByCloud(prev.to_string()));
        }

        Ok(PlacementDecision::AppendToPreviousSet(prev.to_string()))
    }

    /// A pin already stored at exactly this coordinate in the pinset, if any
    pub async fn find_duplicate(&self, pinset_name: &str, coord: Coordinate) -> Result<Option<Pin>> {
        self.repo
            .find_pin_by_coordinate(pinset_name, &coord.lat_string(), &coord.lng_string())
            .await
    }

    /// Whether the pinset can still be the target of the next pin
    pub async fn can_append_to(&self, pinset_name: &str) -> Result<bool> {
        Ok(self.repo.pinset_exists(pinset_name).await?
            && !self.repo.pinset_has_cloud_id(pinset_name).await?)
    }

    /// Drop every pinset that lost all its pins, returns whether any were removed
    pub async fn clean_up_orphans(&self) -> Result<bool> {
        self.repo.delete_orphan_pinsets().await
    }
}
