use anyhow::anyhow;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    acquisition::CoordinateSource,
    location::{Coordinate, LocationError},
    notify::{
        Notice, Notifier, PIN_ALREADY_EXISTS, PIN_DELETED, REMOVED_EMPTY_PINSET, SHARE_LINK_TITLE,
    },
    policy::{PinPlacementPolicy, PlacementDecision},
    render::{MapRenderer, destination_label, map_link, map_pins},
    repository::PinRepository,
    settings::MapSettings,
};

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
pub enum PlacementOutcome {
    /// A pin was created
    Placed {
        pinset_name: String,
        pin_name: String,
        coordinate: Coordinate,
        decision: PlacementDecision,
    },
    /// The previous pinset already has a pin right there, nothing was written
    Duplicate {
        pinset_name: String,
        existing_pin: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// What the user last touched on the map screen
pub struct PlacementSession {
    /// Pinset the next pin joins, unless policy says otherwise
    pub last_used_pinset: Option<String>,
    /// Most recently added or selected pin in `last_used_pinset`
    pub last_pin: Option<String>,
}

/// Top level workflows of the map screen: dropping pins, finding the user, and keeping the
/// map in sync with the repository.
///
/// Every failure is reported to the [Notifier] exactly once before being returned.
pub struct PlacementOrchestrator<L: CoordinateSource, R: PinRepository, M: MapRenderer, N: Notifier>
{
    location: L,
    repo: R,
    map: M,
    notifier: N,
    session: RwLock<PlacementSession>,
}

impl<L: CoordinateSource, R: PinRepository, M: MapRenderer, N: Notifier>
    PlacementOrchestrator<L, R, M, N>
{
    pub fn new(location: L, repo: R, map: M, notifier: N) -> Self {
        Self {
            location,
            repo,
            map,
            notifier,
            session: RwLock::new(PlacementSession::default()),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub async fn session(&self) -> PlacementSession {
        self.session.read().await.clone()
    }

    /// Drop a pin where the device is
    pub async fn place_pin_at_current_location(&self) -> Result<PlacementOutcome, PlacementError> {
        let res = self.place_at_current_location().await;
        self.report(res)
    }

    /// Drop a pin at a point the user tapped. Location access is still required, so this waits
    /// on a location request before placing anything.
    pub async fn place_pin_at_coordinate(
        &self,
        coord: Coordinate,
    ) -> Result<PlacementOutcome, PlacementError> {
        let res = self.place_at_tapped(coord).await;
        self.report(res)
    }

    /// Drop a pin at `coord` without touching location services
    pub async fn place_pin(&self, coord: Coordinate) -> Result<PlacementOutcome, PlacementError> {
        let res = self.place(coord).await;
        self.report(res)
    }

    /// Center the map on the device
    pub async fn find_me(&self) -> Result<Coordinate, PlacementError> {
        let res = self.locate().await;
        self.report(res)
    }

    /// Bring the map up to date when the screen is shown. An empty map goes looking for the
    /// user instead.
    pub async fn activate_screen(&self) -> Result<(), PlacementError> {
        let res = self.activate().await;
        if self.report(res)? {
            if let Err(why) = self.find_me().await {
                debug!("Couldn't find the user on an empty map: {why}");
            }
        }
        Ok(())
    }

    /// The map screen went away. Stopping here also makes the next start deliver a fresh fix.
    pub fn deactivate_screen(&self) {
        debug!("Map screen left, stopping location updates");
        self.location.stop_updates();
    }

    /// Rename a pinset, following it with the next pin if it was the last used one
    pub async fn rename_pinset(&self, old_name: &str, new_name: &str) -> Result<(), PlacementError> {
        let res = self.rename(old_name, new_name).await;
        self.report(res)
    }

    /// Web link to the last pin, shown to the user to copy. `None` when there's no last pin.
    pub async fn share_last_pin(&self) -> Result<Option<String>, PlacementError> {
        let res = self.last_pin_link().await;
        self.report(res)
    }

    /// The user tapped a pin, its pinset becomes the target for the next pin
    pub async fn select_pin(&self, pinset_name: &str, pin_name: &str) -> Result<(), PlacementError> {
        let res = self.select(pinset_name, pin_name).await;
        self.report(res)
    }

    /// Delete the most recently added or selected pin
    pub async fn delete_last_pin(&self) -> Result<(), PlacementError> {
        let session = self.session().await;
        let (Some(pinset_name), Some(pin_name)) = (session.last_used_pinset, session.last_pin)
        else {
            debug!("No last pin to delete");
            return Ok(());
        };
        self.delete_pin(&pinset_name, &pin_name).await
    }

    pub async fn delete_pin(&self, pinset_name: &str, pin_name: &str) -> Result<(), PlacementError> {
        let res = self.delete(pinset_name, pin_name).await;
        self.report(res)
    }

    /// Current text of the "next pin goes to" label
    pub async fn destination_label(&self) -> Result<String, PlacementError> {
        let settings = MapSettings::load(&self.repo).await?;
        let session = self.session.read().await;
        Ok(destination_label(
            session.last_used_pinset.as_deref(),
            settings.create_new_set_for_new_pin,
        ))
    }

    fn policy(&self) -> PinPlacementPolicy<'_, R> {
        PinPlacementPolicy::new(&self.repo)
    }

    /// Granting location access turns the location dot on, so it's put back the way the
    /// user wants it after every fix
    async fn acquire(&self) -> Result<Coordinate, PlacementError> {
        let coord = self.location.acquire_coordinate().await?;
        if !MapSettings::load(&self.repo).await?.show_location_on_map {
            self.map.show_user_location(false);
        }
        Ok(coord)
    }

    async fn locate(&self) -> Result<Coordinate, PlacementError> {
        let coord = self.acquire().await?;
        self.map.recenter(coord);
        Ok(coord)
    }

    async fn place_at_current_location(&self) -> Result<PlacementOutcome, PlacementError> {
        let coord = self.acquire().await?;
        self.place(coord).await
    }

    async fn place_at_tapped(&self, coord: Coordinate) -> Result<PlacementOutcome, PlacementError> {
        self.acquire().await?;
        self.place(coord).await
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), PlacementError> {
        self.repo.rename_pinset(old_name, new_name).await?;

        let mut session = self.session.write().await;
        if session.last_used_pinset.as_deref() == Some(old_name) {
            session.last_used_pinset = Some(new_name.to_string());
        }
        drop(session);

        let settings = MapSettings::load(&self.repo).await?;
        self.refresh_label(&settings).await;
        self.rerender().await?;
        Ok(())
    }

    async fn last_pin_link(&self) -> Result<Option<String>, PlacementError> {
        let session = self.session().await;
        let (Some(pinset_name), Some(pin_name)) = (session.last_used_pinset, session.last_pin)
        else {
            return Ok(None);
        };
        let pin = self
            .repo
            .get_pinset(&pinset_name)
            .await?
            .and_then(|set| set.get_pin(&pin_name).cloned());
        Ok(pin.map(|pin| map_link(&pin.lat, &pin.lng)))
    }

    async fn select(&self, pinset_name: &str, pin_name: &str) -> Result<(), PlacementError> {
        let set = self
            .repo
            .get_pinset(pinset_name)
            .await?
            .ok_or_else(|| anyhow!("Pinset \"{pinset_name}\" doesn't exist"))?;
        if set.get_pin(pin_name).is_none() {
            return Err(anyhow!("Pin \"{pin_name}\" doesn't exist in \"{pinset_name}\"").into());
        }

        let mut session = self.session.write().await;
        session.last_used_pinset = Some(set.name);
        session.last_pin = Some(pin_name.to_string());
        drop(session);

        let settings = MapSettings::load(&self.repo).await?;
        self.refresh_label(&settings).await;
        Ok(())
    }

    async fn delete(&self, pinset_name: &str, pin_name: &str) -> Result<(), PlacementError> {
        self.repo.delete_pin(pinset_name, pin_name).await?;
        // Emptied pinsets go silently
        self.policy().clean_up_orphans().await?;

        let mut session = self.session.write().await;
        if session.last_used_pinset.as_deref() == Some(pinset_name)
            && session.last_pin.as_deref() == Some(pin_name)
        {
            session.last_pin = None;
        }
        drop(session);

        self.forget_unusable_pinset().await?;
        let settings = MapSettings::load(&self.repo).await?;
        self.refresh_label(&settings).await;
        self.rerender().await?;
        self.notifier.notify(Notice::success(PIN_DELETED));
        Ok(())
    }

    async fn place(&self, coord: Coordinate) -> Result<PlacementOutcome, PlacementError> {
        let settings = MapSettings::load(&self.repo).await?;
        let last_used = self.session.read().await.last_used_pinset.clone();
        let policy = self.policy();

        let decision = policy
            .decide(last_used.as_deref(), settings.create_new_set_for_new_pin)
            .await?;
        debug!("Placing pin at {coord:?}: {decision:?}");

        let added = match &decision {
            PlacementDecision::AppendToPreviousSet(target) => {
                if let Some(existing) = policy.find_duplicate(target, coord).await? {
                    return Ok(PlacementOutcome::Duplicate {
                        pinset_name: target.clone(),
                        existing_pin: existing.name,
                    });
                }
                self.repo.add_pin(coord, false, target).await?
            }
            PlacementDecision::PreviousSetBlockedByCloud(blocked) => {
                info!("{blocked} is published, starting a new pinset instead");
                self.repo.add_pin(coord, true, "").await?
            }
            PlacementDecision::NewSet => self.repo.add_pin(coord, true, "").await?,
        };

        // It may have been hidden
        self.repo
            .set_pinset_visibility(&added.pinset_name, true)
            .await?;

        let mut session = self.session.write().await;
        session.last_used_pinset = Some(added.pinset_name.clone());
        session.last_pin = Some(added.pin_name.clone());
        drop(session);

        self.refresh_label(&settings).await;
        self.rerender().await?;
        self.map.recenter(coord);

        Ok(PlacementOutcome::Placed {
            pinset_name: added.pinset_name,
            pin_name: added.pin_name,
            coordinate: coord,
            decision,
        })
    }

    /// Returns whether there are no pinsets at all
    async fn activate(&self) -> Result<bool, PlacementError> {
        let settings = MapSettings::load(&self.repo).await?;
        self.map.show_user_location(settings.show_location_on_map);

        if self.policy().clean_up_orphans().await? {
            self.notifier.notify(Notice::warning(REMOVED_EMPTY_PINSET));
        }

        let pinset_count = self.rerender().await?;
        self.forget_unusable_pinset().await?;
        self.refresh_label(&settings).await;
        Ok(pinset_count == 0)
    }

    /// Forget the last used pinset if it was deleted or published
    async fn forget_unusable_pinset(&self) -> Result<(), PlacementError> {
        let mut session = self.session.write().await;
        let Some(name) = session.last_used_pinset.clone() else {
            return Ok(());
        };
        if !self.policy().can_append_to(&name).await? {
            debug!("Forgetting last used pinset {name}");
            *session = PlacementSession::default();
        }
        Ok(())
    }

    async fn refresh_label(&self, settings: &MapSettings) {
        let session = self.session.read().await;
        let label = destination_label(
            session.last_used_pinset.as_deref(),
            settings.create_new_set_for_new_pin,
        );
        self.map.show_destination_label(&label);
    }

    /// Redraw every visible pin, returns how many pinsets there are
    async fn rerender(&self) -> Result<usize, PlacementError> {
        let pinsets = self.repo.list_pinsets().await?;
        self.map.render_all_pins(&map_pins(&pinsets));
        Ok(pinsets.len())
    }

    fn report<T>(&self, res: Result<T, PlacementError>) -> Result<T, PlacementError>
    where
        T: ReportOutcome,
    {
        match &res {
            Ok(val) => {
                if let Some(notice) = val.notice() {
                    self.notifier.notify(notice);
                }
            }
            Err(PlacementError::Location(why)) => {
                if let Some(notice) = Notice::for_location_error(why) {
                    self.notifier.notify(notice);
                } else {
                    debug!("Location request dropped: {why}");
                }
            }
            Err(PlacementError::Storage(why)) => {
                error!("Storage error: {why:?}");
                self.notifier
                    .notify(Notice::alert("Problem", format!("{why:#}")));
            }
        }
        res
    }
}

/// Successful results that still need to tell the user something
trait ReportOutcome {
    fn notice(&self) -> Option<Notice> {
        None
    }
}

impl ReportOutcome for () {}

impl ReportOutcome for bool {}

/// A link to share
impl ReportOutcome for Option<String> {
    fn notice(&self) -> Option<Notice> {
        self.as_ref()
            .map(|url| Notice::alert(SHARE_LINK_TITLE, url.clone()))
    }
}

impl ReportOutcome for Coordinate {}

impl ReportOutcome for PlacementOutcome {
    fn notice(&self) -> Option<Notice> {
        match self {
            Self::Duplicate { .. } => Some(Notice::warning(PIN_ALREADY_EXISTS)),
            Self::Placed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MemoryRepository, Pin, Pinset,
        location::CANNOT_GET_LOCATION,
        tests::{CountingRepository, MockCoordinates, RecordingMap, RecordingNotifier},
    };
    use std::sync::Arc;
    use tokio::test;

    type TestOrchestrator = PlacementOrchestrator<
        MockCoordinates,
        Arc<CountingRepository<MemoryRepository>>,
        RecordingMap,
        RecordingNotifier,
    >;

    const HERE: Coordinate = Coordinate {
        lat: 37.7749,
        lng: -122.4194,
    };

    const TAPPED: Coordinate = Coordinate {
        lat: 51.5074,
        lng: -0.1278,
    };

    struct Harness {
        orchestrator: TestOrchestrator,
        repo: Arc<CountingRepository<MemoryRepository>>,
    }

    impl Harness {
        fn new(location: MockCoordinates) -> Self {
            let repo = Arc::new(CountingRepository::new(MemoryRepository::new()));
            let orchestrator = PlacementOrchestrator::new(
                location,
                repo.clone(),
                RecordingMap::default(),
                RecordingNotifier::default(),
            );
            Self { orchestrator, repo }
        }

        async fn with_trip(location: MockCoordinates, cloud_id: Option<&str>) -> Self {
            let harness = Self::new(location);
            let mut trip = Pinset::new("Trip");
            trip.pins.push(Pin::at("Pin 1", TAPPED));
            trip.cloud_id = cloud_id.map(str::to_string);
            trip.visible = false;
            harness.repo.inner().insert_pinset(trip).await;
            harness
                .orchestrator
                .select_pin("Trip", "Pin 1")
                .await
                .expect("Failed to select pin");
            harness.repo.reset_counts();
            harness
        }

        fn map(&self) -> &RecordingMap {
            &self.orchestrator.map
        }

        fn notices(&self) -> Vec<Notice> {
            self.orchestrator.notifier.recorded()
        }
    }

    #[test]
    async fn test_first_pin_makes_new_set() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        let outcome = h.orchestrator.place_pin_at_current_location().await.unwrap();

        assert_eq!(
            outcome,
            PlacementOutcome::Placed {
                pinset_name: "Pinset 1".to_string(),
                pin_name: "Pin 1".to_string(),
                coordinate: HERE,
                decision: PlacementDecision::NewSet,
            }
        );
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: Pinset 1".to_string())
        );
        assert_eq!(h.map().recentered(), vec![HERE]);
        assert_eq!(h.map().last_render().len(), 1);
        assert!(h.notices().is_empty());

        let session = h.orchestrator.session().await;
        assert_eq!(session.last_used_pinset.as_deref(), Some("Pinset 1"));
        assert_eq!(session.last_pin.as_deref(), Some("Pin 1"));
    }

    #[test]
    async fn test_appends_to_trip() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), Some("")).await;

        let outcome = h.orchestrator.place_pin_at_current_location().await.unwrap();

        assert_eq!(
            outcome,
            PlacementOutcome::Placed {
                pinset_name: "Trip".to_string(),
                pin_name: "Pin 2".to_string(),
                coordinate: HERE,
                decision: PlacementDecision::AppendToPreviousSet("Trip".to_string()),
            }
        );
        assert_eq!(
            h.orchestrator.destination_label().await.unwrap(),
            "Next pin goes to: Trip"
        );
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: Trip".to_string())
        );

        // Hidden before, forced visible now
        let trip = h.repo.inner().get_pinset("Trip").await.unwrap().unwrap();
        assert!(trip.visible);
        assert_eq!(trip.pins.len(), 2);
        assert_eq!(h.map().last_render().len(), 2);
        assert_eq!(h.repo.duplicate_checks(), vec!["Trip".to_string()]);
    }

    #[test]
    async fn test_published_trip_gets_new_set_silently() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), Some("xyz123")).await;

        let outcome = h.orchestrator.place_pin_at_current_location().await.unwrap();

        assert_eq!(
            outcome,
            PlacementOutcome::Placed {
                pinset_name: "Pinset 1".to_string(),
                pin_name: "Pin 1".to_string(),
                coordinate: HERE,
                decision: PlacementDecision::PreviousSetBlockedByCloud("Trip".to_string()),
            }
        );
        assert!(h.notices().is_empty(), "Warning raised: {:?}", h.notices());
        assert!(h.repo.duplicate_checks().is_empty());

        let trip = h.repo.inner().get_pinset("Trip").await.unwrap().unwrap();
        assert_eq!(trip.pins.len(), 1);
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: Pinset 1".to_string())
        );
    }

    #[test]
    async fn test_duplicate_is_rejected_without_writes() {
        let h = Harness::with_trip(MockCoordinates::ok(TAPPED), None).await;
        let renders_before = h.map().render_count();

        let outcome = h.orchestrator.place_pin_at_current_location().await.unwrap();

        assert_eq!(
            outcome,
            PlacementOutcome::Duplicate {
                pinset_name: "Trip".to_string(),
                existing_pin: "Pin 1".to_string(),
            }
        );
        assert_eq!(h.repo.writes(), 0);
        assert_eq!(h.map().render_count(), renders_before);
        assert!(h.map().recentered().is_empty());
        assert_eq!(h.notices(), vec![Notice::warning(PIN_ALREADY_EXISTS)]);
    }

    #[test]
    async fn test_acquisition_failure_aborts() {
        let h = Harness::with_trip(
            MockCoordinates::err(LocationError::AcquisitionFailed(
                CANNOT_GET_LOCATION.to_string(),
            )),
            None,
        )
        .await;

        let res = h.orchestrator.place_pin_at_current_location().await;

        assert!(matches!(
            res,
            Err(PlacementError::Location(LocationError::AcquisitionFailed(ref msg)))
                if msg == CANNOT_GET_LOCATION
        ));
        assert_eq!(h.repo.writes(), 0);
        assert_eq!(h.repo.reads(), 0);
        assert_eq!(
            h.notices(),
            vec![Notice::alert("Error", CANNOT_GET_LOCATION)]
        );
    }

    #[test]
    async fn test_permission_required_prompts_for_settings() {
        let h = Harness::new(MockCoordinates::err(LocationError::PermissionRequired));

        let res = h.orchestrator.place_pin_at_coordinate(TAPPED).await;

        assert!(matches!(
            res,
            Err(PlacementError::Location(LocationError::PermissionRequired))
        ));
        assert_eq!(h.notices(), vec![Notice::EnableLocation]);
        assert!(h.repo.inner().list_pinsets().await.unwrap().is_empty());
    }

    #[test]
    async fn test_superseded_request_stays_quiet() {
        let h = Harness::new(MockCoordinates::err(LocationError::Superseded));

        assert!(h.orchestrator.find_me().await.is_err());
        assert!(h.notices().is_empty());
        assert!(h.map().recentered().is_empty());
    }

    #[test]
    async fn test_tapped_coordinate_is_used() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        let outcome = h.orchestrator.place_pin_at_coordinate(TAPPED).await.unwrap();

        assert!(matches!(
            outcome,
            PlacementOutcome::Placed { coordinate, .. } if coordinate == TAPPED
        ));
        assert_eq!(h.orchestrator.location.calls(), 1);
        assert_eq!(h.map().recentered(), vec![TAPPED]);
    }

    #[test]
    async fn test_always_new_set_preference() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), None).await;
        h.repo
            .inner()
            .update_setting("createNewSetForNewPin", "yes")
            .await
            .unwrap();

        let outcome = h.orchestrator.place_pin(HERE).await.unwrap();

        assert!(matches!(
            outcome,
            PlacementOutcome::Placed { decision: PlacementDecision::NewSet, ref pinset_name, .. }
                if pinset_name == "Pinset 1"
        ));
        assert_eq!(h.orchestrator.location.calls(), 0);
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: <new set>".to_string())
        );
    }

    #[test]
    async fn test_find_me_recenters() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        assert_eq!(h.orchestrator.find_me().await.unwrap(), HERE);
        assert_eq!(h.map().recentered(), vec![HERE]);
        assert!(h.repo.inner().list_pinsets().await.unwrap().is_empty());
    }

    #[test]
    async fn test_deleting_last_pin_removes_orphan() {
        let h = Harness::new(MockCoordinates::ok(HERE));
        h.orchestrator.place_pin_at_current_location().await.unwrap();

        h.orchestrator.delete_last_pin().await.unwrap();

        assert!(h.repo.inner().list_pinsets().await.unwrap().is_empty());
        assert!(h.map().last_render().is_empty());
        assert_eq!(h.notices(), vec![Notice::success(PIN_DELETED)]);
        assert_eq!(h.orchestrator.session().await, PlacementSession::default());
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: <new set>".to_string())
        );

        // Nothing left to delete
        h.orchestrator.delete_last_pin().await.unwrap();
        assert_eq!(h.notices().len(), 1);
    }

    #[test]
    async fn test_activation_cleans_up() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), None).await;
        h.repo.inner().insert_pinset(Pinset::new("Empty")).await;
        h.repo
            .inner()
            .set_cloud_id("Trip", Some("published".to_string()))
            .await
            .unwrap();
        h.repo
            .inner()
            .update_setting("showLocationOnMap", "no")
            .await
            .unwrap();

        h.orchestrator.activate_screen().await.unwrap();

        assert_eq!(h.notices(), vec![Notice::warning(REMOVED_EMPTY_PINSET)]);
        assert!(!h.repo.inner().pinset_exists("Empty").await.unwrap());
        assert_eq!(h.map().user_location_shown(), Some(false));
        assert_eq!(h.orchestrator.session().await.last_used_pinset, None);
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: <new set>".to_string())
        );

        // Nothing to clean the second time around
        h.orchestrator.activate_screen().await.unwrap();
        assert_eq!(h.notices().len(), 1);
    }

    #[test]
    async fn test_select_missing_pin_is_reported() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        let res = h.orchestrator.select_pin("Nowhere", "Pin 1").await;

        assert!(matches!(res, Err(PlacementError::Storage(_))));
        assert!(matches!(h.notices()[..], [Notice::Alert { .. }]));
        assert_eq!(h.orchestrator.session().await, PlacementSession::default());
    }

    #[test]
    async fn test_empty_map_goes_looking_for_user() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        h.orchestrator.activate_screen().await.unwrap();

        assert_eq!(h.orchestrator.location.calls(), 1);
        assert_eq!(h.map().recentered(), vec![HERE]);
        assert!(h.notices().is_empty());
    }

    #[test]
    async fn test_empty_map_location_failure_reported_once() {
        let h = Harness::new(MockCoordinates::err(LocationError::PermissionRequired));

        h.orchestrator.activate_screen().await.unwrap();

        assert_eq!(h.notices(), vec![Notice::EnableLocation]);
        assert!(h.map().recentered().is_empty());
    }

    #[test]
    async fn test_leaving_screen_stops_updates() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        h.orchestrator.deactivate_screen();

        assert_eq!(h.orchestrator.location.stops(), 1);
        assert_eq!(h.orchestrator.location.calls(), 0);
    }

    #[test]
    async fn test_rename_follows_last_used_pinset() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), None).await;

        h.orchestrator
            .rename_pinset("Trip", "Road Trip")
            .await
            .unwrap();

        let session = h.orchestrator.session().await;
        assert_eq!(session.last_used_pinset.as_deref(), Some("Road Trip"));
        assert_eq!(session.last_pin.as_deref(), Some("Pin 1"));
        assert_eq!(
            h.map().last_label(),
            Some("Next pin goes to: Road Trip".to_string())
        );
        assert!(h.notices().is_empty());

        // The next pin lands in the renamed set
        let outcome = h.orchestrator.place_pin(HERE).await.unwrap();
        assert!(matches!(
            outcome,
            PlacementOutcome::Placed { ref pinset_name, ref pin_name, .. }
                if pinset_name == "Road Trip" && pin_name == "Pin 2"
        ));
    }

    #[test]
    async fn test_rename_other_pinset_keeps_session() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), None).await;
        let mut other = Pinset::new("Other");
        other.pins.push(Pin::at("Pin 1", HERE));
        h.repo.inner().insert_pinset(other).await;

        h.orchestrator.rename_pinset("Other", "Elsewhere").await.unwrap();

        assert_eq!(
            h.orchestrator.session().await.last_used_pinset.as_deref(),
            Some("Trip")
        );
        assert!(h.repo.inner().pinset_exists("Elsewhere").await.unwrap());

        let res = h.orchestrator.rename_pinset("Elsewhere", "Trip").await;
        assert!(matches!(res, Err(PlacementError::Storage(_))));
        assert!(matches!(h.notices()[..], [Notice::Alert { .. }]));
    }

    #[test]
    async fn test_location_dot_hidden_after_fix() {
        let h = Harness::new(MockCoordinates::ok(HERE));
        h.repo
            .inner()
            .update_setting("showLocationOnMap", "no")
            .await
            .unwrap();

        h.orchestrator.find_me().await.unwrap();
        assert_eq!(h.map().user_location_shown(), Some(false));

        h.orchestrator.place_pin_at_current_location().await.unwrap();
        assert_eq!(h.map().user_location_shown(), Some(false));
    }

    #[test]
    async fn test_location_dot_left_alone_when_wanted() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        h.orchestrator.find_me().await.unwrap();

        assert_eq!(h.map().user_location_shown(), None);
    }

    #[test]
    async fn test_share_last_pin() {
        let h = Harness::with_trip(MockCoordinates::ok(HERE), None).await;

        let link = h.orchestrator.share_last_pin().await.unwrap();

        let expected =
            "https://www.sharetheres.com/pinLocator.html?lat=51.5074&lng=-0.1278".to_string();
        assert_eq!(link.as_deref(), Some(expected.as_str()));
        assert_eq!(
            h.notices(),
            vec![Notice::alert("Copy this hyperlink", expected)]
        );
    }

    #[test]
    async fn test_share_without_last_pin_is_quiet() {
        let h = Harness::new(MockCoordinates::ok(HERE));

        assert_eq!(h.orchestrator.share_last_pin().await.unwrap(), None);
        assert!(h.notices().is_empty());
    }
}
