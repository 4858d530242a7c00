use clap::{Parser, Subcommand, ValueEnum};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use pinset_logic::{AuthorizationState, Coordinate, SettingKey};
use pinset_test_shared::{
    MapRequest, PlatformRequest, TestingRequest, TestingResponse, get_socket_name, prelude::*,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the test daemon is listening on
    socket: String,

    /// Stop listening after this many seconds without a response
    #[arg(long, default_value_t = 1)]
    wait: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Authorization {
    NotDetermined,
    Denied,
    Restricted,
    Always,
    WhenInUse,
}

impl From<Authorization> for AuthorizationState {
    fn from(value: Authorization) -> Self {
        match value {
            Authorization::NotDetermined => AuthorizationState::NotDetermined,
            Authorization::Denied => AuthorizationState::Denied,
            Authorization::Restricted => AuthorizationState::Restricted,
            Authorization::Always => AuthorizationState::AuthorizedAlways,
            Authorization::WhenInUse => AuthorizationState::AuthorizedWhenInUse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Setting {
    AlwaysNewSet,
    ShowLocation,
}

impl From<Setting> for SettingKey {
    fn from(value: Setting) -> Self {
        match value {
            Setting::AlwaysNewSet => SettingKey::CreateNewSetForNewPin,
            Setting::ShowLocation => SettingKey::ShowLocationOnMap,
        }
    }
}

#[derive(Subcommand)]
enum DeviceCommand {
    /// Change location authorization, like answering the prompt would
    Authorize {
        #[arg(value_enum)]
        state: Authorization,
    },
    /// Move the device
    MoveTo {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Report a failure to get a fix
    Fail {
        #[arg(default_value = "Location unknown")]
        message: String,
    },
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the device's location services
    #[command(subcommand)]
    Device(DeviceCommand),
    /// Show the map screen
    Activate,
    /// Leave the map screen
    Deactivate,
    /// Drop a pin where the device is
    PlaceHere,
    /// Drop a pin where the map was tapped
    PlaceAt {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Center the map on the device
    FindMe,
    /// Tap a pin on the map
    Select { pinset: String, pin: String },
    /// Delete a pin
    Delete { pinset: String, pin: String },
    /// Delete the last added or selected pin
    DeleteLast,
    /// Rename a pinset
    Rename { old: String, new: String },
    /// Get a web link to the last pin
    Share,
    /// Change a setting
    Set {
        #[arg(value_enum)]
        setting: Setting,
        #[arg(action = clap::ArgAction::Set)]
        on: bool,
    },
    /// Print every pinset
    List,
    /// Save pinsets to the daemon's store file
    Save,
}

impl From<Commands> for TestingRequest {
    fn from(value: Commands) -> Self {
        match value {
            Commands::Device(DeviceCommand::Authorize { state }) => {
                PlatformRequest::SetAuthorization(state.into()).into()
            }
            Commands::Device(DeviceCommand::MoveTo { lat, lng }) => {
                PlatformRequest::MoveTo(Coordinate::new(lat, lng)).into()
            }
            Commands::Device(DeviceCommand::Fail { message }) => {
                PlatformRequest::Fail(message).into()
            }
            Commands::Activate => MapRequest::Activate.into(),
            Commands::Deactivate => MapRequest::Deactivate.into(),
            Commands::PlaceHere => MapRequest::PlaceHere.into(),
            Commands::PlaceAt { lat, lng } => MapRequest::PlaceAt(Coordinate::new(lat, lng)).into(),
            Commands::FindMe => MapRequest::FindMe.into(),
            Commands::Select { pinset, pin } => MapRequest::SelectPin {
                pinset_name: pinset,
                pin_name: pin,
            }
            .into(),
            Commands::Delete { pinset, pin } => MapRequest::DeletePin {
                pinset_name: pinset,
                pin_name: pin,
            }
            .into(),
            Commands::DeleteLast => MapRequest::DeleteLastPin.into(),
            Commands::Rename { old, new } => MapRequest::RenamePinset {
                old_name: old,
                new_name: new,
            }
            .into(),
            Commands::Share => MapRequest::ShareLastPin.into(),
            Commands::Set { setting, on } => MapRequest::SetSetting(setting.into(), on).into(),
            Commands::List => TestingRequest::ListPinsets,
            Commands::Save => TestingRequest::Save,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let mut recv = BufReader::new(&stream);
    let mut send = &stream;

    let req = TestingRequest::from(cli.command);
    let mut encoded = serde_json::to_vec(&req).context("Failed to encode request")?;
    encoded.push(b'\n');
    send.write_all(&encoded)
        .await
        .context("Failed to send request")?;

    let wait = Duration::from_secs(cli.wait);
    let mut buffer = String::with_capacity(256);

    // Responses from earlier background requests show up here too, keep printing until quiet
    while let Ok(res) = tokio::time::timeout(wait, recv.read_line(&mut buffer)).await {
        if res.context("Failed to read response")? == 0 {
            break;
        }
        let resp = serde_json::from_str::<TestingResponse>(&buffer)
            .with_context(|| format!("Bad response: {}", buffer.trim()))?;
        buffer.clear();
        println!("{resp:?}");
    }

    Ok(())
}
