use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use crate::{
    UtcDT,
    location::{
        AuthorizationState, CANNOT_GET_LOCATION, Coordinate, LocationError, LocationEvent,
        LocationSource, TIMEOUT_MESSAGE,
    },
    permission::PermissionGate,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Progress of a location request, meant for showing/hiding a busy indicator
pub enum AcquisitionProgress {
    /// A request started
    Locating,
    /// The permission prompt is about to be shown, the busy indicator should get out of the way
    AwaitingPermission,
    /// The request settled (either way)
    Finished,
}

pub trait ProgressSender {
    fn send_progress(&self, progress: AcquisitionProgress);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// How long to wait for the platform before failing a request. `None` waits forever.
    pub timeout: Option<Duration>,
}

type Settlement = Result<(), LocationError>;

/// The single in-flight location request. Settling consumes it, so it can only settle once.
struct PendingLocationRequest {
    id: Uuid,
    created: UtcDT,
    settle: oneshot::Sender<Settlement>,
}

impl PendingLocationRequest {
    fn new() -> (Self, oneshot::Receiver<Settlement>) {
        let (settle, recv) = oneshot::channel();
        let req = Self {
            id: Uuid::new_v4(),
            created: Utc::now(),
            settle,
        };
        (req, recv)
    }

    fn settle(self, res: Settlement) {
        if self.settle.send(res).is_err() {
            debug!("Location request {} was abandoned before settling", self.id);
        }
    }
}

#[derive(Default)]
struct AcquisitionState {
    pending: Option<PendingLocationRequest>,
    /// Most recent fix the platform delivered, kept between requests
    last_known: Option<Coordinate>,
}

/// Turns the platform's permission checks and delegate callbacks into a single awaitable
/// request for a coordinate.
///
/// Platform callbacks are fed in through [LocationAcquisitionService::handle_event]. Only one
/// request is live at a time, starting a new one invalidates whatever was pending.
pub struct LocationAcquisitionService<G: PermissionGate, S: LocationSource, P: ProgressSender> {
    gate: G,
    source: S,
    progress: P,
    config: AcquisitionConfig,
    state: Mutex<AcquisitionState>,
}

impl<G: PermissionGate, S: LocationSource, P: ProgressSender> LocationAcquisitionService<G, S, P> {
    pub fn new(gate: G, source: S, progress: P, config: AcquisitionConfig) -> Self {
        Self {
            gate,
            source,
            progress,
            config,
            state: Mutex::new(AcquisitionState::default()),
        }
    }

    /// Get the device's coordinate, asking for permission first if the user was never asked.
    ///
    /// Fails right away if location access is denied or restricted. Never retries on its own.
    pub async fn acquire_coordinate(&self) -> Result<Coordinate, LocationError> {
        let status = self.gate.check_status();
        debug!("Acquiring coordinate, authorization is {status:?}");

        if status.is_blocked() {
            // Whatever was waiting belongs to an older tap, it must not settle after this
            if self.abandon_pending().await {
                self.progress.send_progress(AcquisitionProgress::Finished);
            }
            return Err(LocationError::PermissionRequired);
        }

        self.progress.send_progress(AcquisitionProgress::Locating);

        let (id, recv) = self.begin_request().await;

        if status.is_authorized() {
            self.restart_updates();
        } else {
            self.progress
                .send_progress(AcquisitionProgress::AwaitingPermission);
            self.gate.request_permission();
        }

        let res = self.wait_for_settlement(id, recv).await;

        if res != Err(LocationError::Superseded) {
            self.progress.send_progress(AcquisitionProgress::Finished);
        }

        res?;

        self.current_coordinate().await
    }

    /// Best coordinate available without waiting: the platform's live one, then the last fix
    /// we saw.
    pub async fn current_coordinate(&self) -> Result<Coordinate, LocationError> {
        if let Some(coord) = self.source.current_location() {
            return Ok(coord);
        }

        self.state
            .lock()
            .await
            .last_known
            .ok_or_else(|| LocationError::AcquisitionFailed(CANNOT_GET_LOCATION.to_string()))
    }

    /// Feed a platform callback into the service
    pub async fn handle_event(&self, event: LocationEvent) {
        match event {
            LocationEvent::AuthorizationChanged(status) => {
                self.on_authorization_changed(status).await
            }
            LocationEvent::LocationsUpdated(locations) => self.on_locations_updated(locations).await,
            LocationEvent::AcquisitionFailed(msg) => self.on_acquisition_failed(msg).await,
        }
    }

    pub async fn has_pending_request(&self) -> bool {
        self.state.lock().await.pending.is_some()
    }

    /// Identity of the request currently allowed to settle
    pub async fn pending_request_id(&self) -> Option<Uuid> {
        self.state.lock().await.pending.as_ref().map(|req| req.id)
    }

    /// When the pending request was started
    pub async fn pending_since(&self) -> Option<UtcDT> {
        self.state.lock().await.pending.as_ref().map(|req| req.created)
    }

    pub async fn last_known_location(&self) -> Option<Coordinate> {
        self.state.lock().await.last_known
    }

    /// Stop the platform's continuous updates, e.g. when the map goes away
    pub fn stop_updates(&self) {
        self.source.stop_updates();
    }

    async fn begin_request(&self) -> (Uuid, oneshot::Receiver<Settlement>) {
        let (req, recv) = PendingLocationRequest::new();
        let id = req.id;
        let mut state = self.state.lock().await;
        if let Some(old) = state.pending.replace(req) {
            // Dropping the old request closes its channel, its waiter sees Superseded
            info!(
                "Location request {} (started {}) replaced by {id}",
                old.id, old.created
            );
        }
        (id, recv)
    }

    async fn wait_for_settlement(
        &self,
        id: Uuid,
        mut recv: oneshot::Receiver<Settlement>,
    ) -> Settlement {
        let received = if let Some(limit) = self.config.timeout {
            match tokio::time::timeout(limit, &mut recv).await {
                Ok(received) => received.ok(),
                Err(_) => {
                    if self.take_pending_if(id).await {
                        warn!("Location request {id} timed out after {limit:?}");
                        return Err(LocationError::AcquisitionFailed(
                            TIMEOUT_MESSAGE.to_string(),
                        ));
                    }
                    // Not ours anymore, it was either settled right at the deadline or replaced
                    recv.try_recv().ok()
                }
            }
        } else {
            recv.await.ok()
        };

        received.unwrap_or(Err(LocationError::Superseded))
    }

    /// Drop the pending request without settling it, its waiter sees Superseded
    async fn abandon_pending(&self) -> bool {
        let pending = self.state.lock().await.pending.take();
        if let Some(req) = pending {
            info!("Abandoning location request {} (started {})", req.id, req.created);
            true
        } else {
            false
        }
    }

    async fn take_pending_if(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        if state.pending.as_ref().is_some_and(|req| req.id == id) {
            state.pending = None;
            true
        } else {
            false
        }
    }

    async fn settle_pending(&self, res: Settlement) -> bool {
        let pending = self.state.lock().await.pending.take();
        if let Some(req) = pending {
            debug!("Settling location request {} with {res:?}", req.id);
            req.settle(res);
            true
        } else {
            false
        }
    }

    /// Stop first so the platform redelivers an initial fix instead of treating the start as
    /// a no-op
    fn restart_updates(&self) {
        self.source.stop_updates();
        self.source.start_updates();
    }

    async fn on_authorization_changed(&self, status: AuthorizationState) {
        if !self.has_pending_request().await {
            // The platform fires this on its own at startup
            debug!("Ignoring authorization change to {status:?}, no request pending");
            return;
        }

        match status {
            AuthorizationState::Denied | AuthorizationState::Restricted => {
                self.settle_pending(Err(LocationError::PermissionRequired))
                    .await;
            }
            AuthorizationState::AuthorizedAlways | AuthorizationState::AuthorizedWhenInUse => {
                // Settled by the location update that follows
                self.restart_updates();
            }
            AuthorizationState::NotDetermined => {}
        }
    }

    async fn on_locations_updated(&self, locations: Vec<Coordinate>) {
        let mut state = self.state.lock().await;
        if let Some(latest) = locations.last() {
            state.last_known = Some(*latest);
        }
        if let Some(req) = state.pending.take() {
            drop(state);
            debug!("Got a fix for location request {}", req.id);
            req.settle(Ok(()));
        }
    }

    async fn on_acquisition_failed(&self, msg: String) {
        warn!("Platform failed to get a location: {msg}");
        if !self
            .settle_pending(Err(LocationError::AcquisitionFailed(msg)))
            .await
        {
            debug!("No location request pending for the failure");
        }
    }
}

/// Anything that can hand the orchestrator a coordinate
pub trait CoordinateSource {
    fn acquire_coordinate(&self) -> impl Future<Output = Result<Coordinate, LocationError>>;
    /// Stop delivering fixes until the next acquisition
    fn stop_updates(&self);
}

impl<G: PermissionGate, S: LocationSource, P: ProgressSender> CoordinateSource
    for LocationAcquisitionService<G, S, P>
{
    fn acquire_coordinate(&self) -> impl Future<Output = Result<Coordinate, LocationError>> {
        LocationAcquisitionService::acquire_coordinate(self)
    }

    fn stop_updates(&self) {
        LocationAcquisitionService::stop_updates(self)
    }
}

impl<C: CoordinateSource> CoordinateSource for std::sync::Arc<C> {
    fn acquire_coordinate(&self) -> impl Future<Output = Result<Coordinate, LocationError>> {
        (**self).acquire_coordinate()
    }

    fn stop_updates(&self) {
        (**self).stop_updates()
    }
}
