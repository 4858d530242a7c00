use clap::Parser;
use log::{debug, error, info, warn};
use pinset_logic::{
    AcquisitionConfig, AcquisitionProgress, AuthorizationState, Coordinate,
    LocationAcquisitionService, LocationEvent, LocationSource, MapPin, MapRenderer,
    MemoryRepository, Notice, Notifier, PermissionGate, PinRepository, PlacementError,
    PlacementOrchestrator, ProgressSender, flag_value,
};
use pinset_test_shared::*;
use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// Pretend device, answers the service's calls and feeds callbacks back through a channel
struct SimPlatform {
    authorization: StdMutex<AuthorizationState>,
    position: StdMutex<Option<Coordinate>>,
    updating: AtomicBool,
    events: mpsc::UnboundedSender<LocationEvent>,
    responses: ResponseSender,
}

impl SimPlatform {
    fn new(events: mpsc::UnboundedSender<LocationEvent>, responses: ResponseSender) -> Self {
        Self {
            authorization: StdMutex::new(AuthorizationState::NotDetermined),
            position: StdMutex::new(None),
            updating: AtomicBool::new(false),
            events,
            responses,
        }
    }

    fn emit(&self, event: LocationEvent) {
        if self.events.send(event).is_err() {
            warn!("Event pump is gone, dropping location event");
        }
    }

    fn set_authorization(&self, status: AuthorizationState) {
        if let Ok(mut auth) = self.authorization.lock() {
            *auth = status;
        }
        self.emit(LocationEvent::AuthorizationChanged(status));
    }

    fn move_to(&self, coord: Coordinate) {
        if let Ok(mut pos) = self.position.lock() {
            *pos = Some(coord);
        }
        if self.updating.load(Ordering::SeqCst) {
            self.emit(LocationEvent::LocationsUpdated(vec![coord]));
        }
    }

    fn position(&self) -> Option<Coordinate> {
        self.position.lock().ok().and_then(|pos| *pos)
    }
}

impl PermissionGate for SimPlatform {
    fn check_status(&self) -> AuthorizationState {
        self.authorization
            .lock()
            .map(|auth| *auth)
            .unwrap_or(AuthorizationState::Restricted)
    }

    fn request_permission(&self) {
        self.responses.push(TestingResponse::PermissionPrompted);
    }
}

impl LocationSource for SimPlatform {
    fn start_updates(&self) {
        self.updating.store(true, Ordering::SeqCst);
        // Starting delivers the initial fix if the device knows where it is
        if let Some(coord) = self.position() {
            self.emit(LocationEvent::LocationsUpdated(vec![coord]));
        }
    }

    fn stop_updates(&self) {
        self.updating.store(false, Ordering::SeqCst);
    }

    fn current_location(&self) -> Option<Coordinate> {
        // A real device only has a live fix while updating
        if self.updating.load(Ordering::SeqCst) {
            self.position()
        } else {
            None
        }
    }
}

/// Forwards everything the UI would show to whoever is connected
#[derive(Clone)]
struct ResponseSender(mpsc::UnboundedSender<TestingResponse>);

impl ResponseSender {
    fn push(&self, resp: impl Into<TestingResponse>) {
        if self.0.send(resp.into()).is_err() {
            warn!("Response channel closed");
        }
    }
}

impl ProgressSender for ResponseSender {
    fn send_progress(&self, progress: AcquisitionProgress) {
        self.push(progress);
    }
}

impl MapRenderer for ResponseSender {
    fn render_all_pins(&self, pins: &[MapPin]) {
        self.push(TestingResponse::PinsRendered(pins.to_vec()));
    }

    fn recenter(&self, coord: Coordinate) {
        self.push(TestingResponse::Recentered(coord));
    }

    fn show_destination_label(&self, label: &str) {
        self.push(TestingResponse::DestinationLabel(label.to_string()));
    }

    fn show_user_location(&self, show: bool) {
        self.push(TestingResponse::UserLocationShown(show));
    }
}

impl Notifier for ResponseSender {
    fn notify(&self, notice: Notice) {
        self.push(notice);
    }
}

/// How long background requests get to finish when the daemon shuts down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type Service = LocationAcquisitionService<Arc<SimPlatform>, Arc<SimPlatform>, ResponseSender>;
type Orchestrator =
    PlacementOrchestrator<Arc<Service>, Arc<MemoryRepository>, ResponseSender, ResponseSender>;

struct DaemonState {
    platform: Arc<SimPlatform>,
    repo: Arc<MemoryRepository>,
    orchestrator: Arc<Orchestrator>,
    responses: ResponseSender,
    store: Option<PathBuf>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl DaemonState {
    /// Wire up the simulated platform and start the event pump
    fn start(
        repo: MemoryRepository,
        store: Option<PathBuf>,
        config: AcquisitionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TestingResponse>, JoinHandle<()>) {
        let (resp_tx, resp_rx) = mpsc::unbounded_channel::<TestingResponse>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LocationEvent>();
        let responses = ResponseSender(resp_tx);

        let platform = Arc::new(SimPlatform::new(event_tx, responses.clone()));
        let service = Arc::new(LocationAcquisitionService::new(
            platform.clone(),
            platform.clone(),
            responses.clone(),
            config,
        ));

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(event_pump(service.clone(), event_rx, cancel.clone()));

        let repo = Arc::new(repo);
        let orchestrator = Arc::new(PlacementOrchestrator::new(
            service,
            repo.clone(),
            responses.clone(),
            responses.clone(),
        ));
        let state = Self {
            platform,
            repo,
            orchestrator,
            responses,
            store,
            tasks: Mutex::new(vec![]),
            cancel,
        };
        (state, resp_rx, pump)
    }

    fn process_platform_req(&self, req: PlatformRequest) {
        match req {
            PlatformRequest::SetAuthorization(status) => self.platform.set_authorization(status),
            PlatformRequest::MoveTo(coord) => self.platform.move_to(coord),
            PlatformRequest::Fail(msg) => self.platform.emit(LocationEvent::AcquisitionFailed(msg)),
        }
    }

    /// Anything that may wait on location runs in the background so platform requests can
    /// still come in and settle it
    async fn spawn_background(&self, req: MapRequest) {
        let orchestrator = self.orchestrator.clone();
        let responses = self.responses.clone();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            let res = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Shutting down, dropping {req:?}");
                    return;
                }
                res = run_background(&orchestrator, req.clone()) => res,
            };
            match res {
                Ok(resp) => responses.push(resp),
                // Already shown to the user as a notice
                Err(why) => debug!("{req:?} ended: {why}"),
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Wait on background requests, anything still running after [SHUTDOWN_GRACE] is
    /// cancelled
    async fn finish_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for mut task in tasks {
            let res = match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(res) => res,
                Err(_) => {
                    self.cancel.cancel();
                    task.await
                }
            };
            if let Err(why) = res {
                warn!("Background request panicked: {why:?}");
            }
        }
    }

    async fn process_map_req(&self, req: MapRequest) -> Result<(), TestingResponse> {
        let res = match req {
            MapRequest::Activate
            | MapRequest::PlaceHere
            | MapRequest::PlaceAt(_)
            | MapRequest::FindMe => {
                self.spawn_background(req).await;
                return Ok(());
            }
            MapRequest::Deactivate => {
                self.orchestrator.deactivate_screen();
                Ok(())
            }
            MapRequest::SelectPin {
                pinset_name,
                pin_name,
            } => {
                self.orchestrator
                    .select_pin(&pinset_name, &pin_name)
                    .await
            }
            MapRequest::DeletePin {
                pinset_name,
                pin_name,
            } => {
                self.orchestrator
                    .delete_pin(&pinset_name, &pin_name)
                    .await
            }
            MapRequest::DeleteLastPin => self.orchestrator.delete_last_pin().await,
            MapRequest::RenamePinset { old_name, new_name } => {
                self.orchestrator
                    .rename_pinset(&old_name, &new_name)
                    .await
            }
            // The link goes out as a notice
            MapRequest::ShareLastPin => self.orchestrator.share_last_pin().await.map(|_| ()),
            MapRequest::SetSetting(key, on) => {
                self.repo
                    .update_setting(key.as_str(), flag_value(on))
                    .await?;
                // Coming back from settings re-activates the map
                self.spawn_background(MapRequest::Activate).await;
                return Ok(());
            }
        };
        res.map_err(|why| TestingResponse::Error(why.to_string()))
    }

    async fn save(&self) -> Result {
        if let Some(path) = &self.store {
            self.repo.save_json(path).await?;
            info!("Saved pinsets to {}", path.display());
        } else {
            debug!("No store file, not saving");
        }
        Ok(())
    }

    /// Stop everything in flight, then persist
    async fn shutdown(&self, pump: JoinHandle<()>) -> Result {
        self.finish_tasks().await;
        self.cancel.cancel();
        if let Err(why) = pump.await {
            warn!("Event pump panicked: {why:?}");
        }
        self.save().await
    }

    pub async fn process_req(&self, req: TestingRequest) -> Result<(), TestingResponse> {
        match req {
            TestingRequest::Platform(platform_request) => {
                self.process_platform_req(platform_request)
            }
            TestingRequest::Map(map_request) => self.process_map_req(map_request).await?,
            TestingRequest::ListPinsets => {
                let pinsets = self.repo.list_pinsets().await?;
                self.responses.push(pinsets);
            }
            TestingRequest::Save => self.save().await?,
        }
        Ok(())
    }
}

async fn run_background(
    orchestrator: &Orchestrator,
    req: MapRequest,
) -> Result<TestingResponse, PlacementError> {
    match req {
        MapRequest::Activate => orchestrator
            .activate_screen()
            .await
            .map(|_| TestingResponse::Complete),
        MapRequest::PlaceHere => orchestrator
            .place_pin_at_current_location()
            .await
            .map(TestingResponse::from),
        MapRequest::PlaceAt(coord) => orchestrator
            .place_pin_at_coordinate(coord)
            .await
            .map(TestingResponse::from),
        MapRequest::FindMe => orchestrator
            .find_me()
            .await
            .map(|_| TestingResponse::Complete),
        other => {
            error!("{other:?} doesn't run in the background");
            Ok(TestingResponse::Complete)
        }
    }
}

/// Delivers platform callbacks to the service in the order they were raised
async fn event_pump(
    service: Arc<Service>,
    mut events: mpsc::UnboundedReceiver<LocationEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(event) = events.recv() => {
                debug!("Platform event: {event:?}");
                service.handle_event(event).await;
            }
            else => break,
        }
    }
}

use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket to listen on
    socket: String,
    /// JSON file to load pinsets from and save them to
    #[arg(long)]
    store: Option<PathBuf>,
    /// Give up on a location request after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

async fn load_repo(store: Option<&PathBuf>) -> Result<MemoryRepository> {
    match store {
        Some(path)
            if tokio::fs::try_exists(path)
                .await
                .with_context(|| format!("Failed to check for store file {}", path.display()))? =>
        {
            MemoryRepository::load_json(path).await
        }
        _ => Ok(MemoryRepository::new()),
    }
}

async fn write_resp(send: &mut (impl AsyncWriteExt + Unpin), resp: &TestingResponse) -> Result {
    let mut encoded = serde_json::to_vec(resp).context("Failed to encode response")?;
    encoded.push(b'\n');
    send.write_all(&encoded)
        .await
        .context("Failed to send response")
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();
    let socket_name = get_socket_name(cli.socket)?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;

    let repo = load_repo(cli.store.as_ref())
        .await
        .context("Failed to load pinsets")?;
    let config = AcquisitionConfig {
        timeout: cli.timeout.map(Duration::from_secs),
    };
    let (state, mut resp_rx, pump) = DaemonState::start(repo, cli.store, config);

    info!("Testing Daemon Ready");

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let mut recv = BufReader::new(&stream);
                let mut send = &stream;

                let mut buffer = String::with_capacity(256);

                loop {
                    tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = recv.read_line(&mut buffer) => {
                            match res {
                                Ok(0) => {
                                    break;
                                }
                                Ok(_amnt) => {
                                    let parsed = serde_json::from_str::<TestingRequest>(&buffer);
                                    buffer.clear();
                                    let outcome = match parsed {
                                        Ok(req) => state.process_req(req).await.err(),
                                        Err(why) => Some(TestingResponse::Error(format!("Bad request: {why}"))),
                                    };
                                    let resp = outcome.unwrap_or(TestingResponse::Complete);
                                    if let Err(why) = write_resp(&mut send, &resp).await {
                                        error!("{why:?}");
                                        break;
                                    }
                                }
                                Err(why) => {
                                    error!("Read Error: {why:?}");
                                    break;
                                }
                            }
                        }
                        Some(resp) = resp_rx.recv() => {
                            if let Err(why) = write_resp(&mut send, &resp).await {
                                error!("{why:?}");
                                break;
                            }
                        }
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    state.shutdown(pump).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::test;

    fn start() -> (
        DaemonState,
        mpsc::UnboundedReceiver<TestingResponse>,
        JoinHandle<()>,
    ) {
        DaemonState::start(MemoryRepository::new(), None, AcquisitionConfig::default())
    }

    async fn send(state: &DaemonState, req: impl Into<TestingRequest>) {
        state
            .process_req(req.into())
            .await
            .expect("Request failed");
    }

    #[test]
    async fn test_shutdown_waits_for_placement() {
        let (state, _responses, pump) = start();
        send(
            &state,
            PlatformRequest::SetAuthorization(AuthorizationState::AuthorizedWhenInUse),
        )
        .await;
        send(&state, PlatformRequest::MoveTo(Coordinate::new(40.0, -75.0))).await;
        send(&state, MapRequest::PlaceHere).await;

        state.shutdown(pump).await.expect("Failed to shut down");

        let pinsets = state.repo.list_pinsets().await.unwrap();
        assert_eq!(pinsets.len(), 1);
        assert_eq!(pinsets[0].pins.len(), 1);
        assert!(state.tasks.lock().await.is_empty());
    }

    #[test]
    async fn test_shutdown_cancels_stuck_request() {
        tokio::time::pause();
        let (state, mut responses, pump) = start();

        // Nobody ever answers the permission prompt
        send(&state, MapRequest::PlaceHere).await;

        state.shutdown(pump).await.expect("Failed to shut down");

        assert!(state.cancel.is_cancelled());
        assert!(state.repo.list_pinsets().await.unwrap().is_empty());

        let mut prompted = false;
        while let Ok(resp) = responses.try_recv() {
            assert!(!matches!(resp, TestingResponse::Placed(_)), "Placed: {resp:?}");
            prompted |= matches!(resp, TestingResponse::PermissionPrompted);
        }
        assert!(prompted);
    }

    #[test]
    async fn test_finished_tasks_are_pruned() {
        let (state, _responses, pump) = start();
        send(
            &state,
            PlatformRequest::SetAuthorization(AuthorizationState::Denied),
        )
        .await;

        send(&state, MapRequest::FindMe).await;
        // Refused straight away, let it run to completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        send(&state, MapRequest::FindMe).await;

        assert_eq!(state.tasks.lock().await.len(), 1);
        state.shutdown(pump).await.expect("Failed to shut down");
    }

    #[test]
    async fn test_missing_store_starts_empty() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("no-such-store.json");

        let repo = load_repo(Some(&path)).await.expect("Failed to load");

        assert!(repo.list_pinsets().await.unwrap().is_empty());
    }

    #[test]
    async fn test_unreadable_store_path_is_an_error() {
        // A file can't have children, so this can't be checked at all
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("Cargo.toml")
            .join("store.json");

        let res = load_repo(Some(&path)).await;

        assert!(res.is_err());
    }
}
