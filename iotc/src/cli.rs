use clap::{Args, Parser, Subcommand};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{LedBackend, Platform};
use crate::util::types::DeviceId;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Directory holding the stored configuration
    #[arg(env = "IOTC_CONFIG_DIR", long = "config-dir", value_name = "path", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Store the device and firmware update configuration
    Configure(ConfigureArgs),

    /// Download a firmware image into the image directory
    Download(DownloadArgs),

    /// Run cloud-to-device messages read from stdin, one JSON document per
    /// line, through the command worker
    Replay(ReplayArgs),
}

#[derive(Clone, Debug, Default, Args)]
pub struct DeviceArgs {
    /// Unique name of this device on the platform
    #[arg(env = "IOTC_DEVICE_ID", long = "device-id", value_name = "id")]
    pub device_id: Option<DeviceId>,

    /// Cloud platform hosting the device
    #[arg(env = "IOTC_PLATFORM", long = "platform", value_enum)]
    pub platform: Option<Platform>,

    /// Company id
    #[arg(env = "IOTC_CPID", long = "cpid", value_name = "str")]
    pub cpid: Option<String>,

    /// Platform environment
    #[arg(env = "IOTC_ENV", long = "env", value_name = "str")]
    pub env: Option<String>,

    /// MQTT broker endpoint
    #[arg(env = "IOTC_MQTT_ENDPOINT", long = "mqtt-endpoint", value_name = "host")]
    pub mqtt_endpoint: Option<String>,

    /// Version of the firmware currently running
    #[arg(
        env = "IOTC_FIRMWARE_VERSION",
        long = "firmware-version",
        value_name = "str"
    )]
    pub firmware_version: Option<String>,
}

#[derive(Clone, Debug, Default, Args)]
pub struct OtaArgs {
    /// Directory downloaded images are stored in
    #[arg(env = "IOTC_IMAGE_DIR", long = "image-dir", value_name = "path")]
    pub image_dir: Option<PathBuf>,

    /// Image file name used when an update does not name one
    #[arg(
        env = "IOTC_DEFAULT_IMAGE_NAME",
        long = "default-image-name",
        value_name = "name"
    )]
    pub default_image_name: Option<String>,

    /// Delay between acknowledging an update and activating it, in milliseconds
    #[arg(
        env = "IOTC_COMMIT_DELAY_MS",
        long = "commit-delay-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub commit_delay: Option<Duration>,

    /// Program run with the image path to activate a downloaded image
    #[arg(
        env = "IOTC_ACTIVATE_COMMAND",
        long = "activate-command",
        value_name = "cmd"
    )]
    pub activate_command: Option<String>,

    /// Bytes requested per ranged GET
    #[arg(env = "IOTC_CHUNK_SIZE", long = "chunk-size", value_name = "bytes")]
    pub chunk_size: Option<usize>,

    /// Network failures tolerated over a whole download
    #[arg(env = "IOTC_RETRY_BUDGET", long = "retry-budget", value_name = "int")]
    pub retry_budget: Option<u32>,

    /// PEM bundle with additional trusted root certificates
    #[arg(env = "IOTC_ROOT_CA", long = "root-ca", value_name = "path")]
    pub root_ca: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct ConfigureArgs {
    /// Forget the stored configuration before applying the arguments
    #[arg(long = "reset")]
    pub reset: bool,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(flatten)]
    pub ota: OtaArgs,
}

#[derive(Clone, Debug, Args)]
pub struct DownloadArgs {
    /// Image URL, presigned URLs are fine
    #[arg(value_name = "url")]
    pub url: String,

    /// Store the image under this name instead of the one in the URL
    #[arg(long = "file-name", value_name = "name")]
    pub file_name: Option<String>,

    /// Activate the image once downloaded
    #[arg(long = "activate")]
    pub activate: bool,

    #[command(flatten)]
    pub ota: OtaArgs,
}

#[derive(Clone, Debug, Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(flatten)]
    pub ota: OtaArgs,

    /// Where LED commands go
    #[arg(env = "IOTC_LEDS", long = "leds", value_enum, default_value_t = LedBackend::Log)]
    pub leds: LedBackend,

    /// Root of the Linux LED class
    #[arg(
        env = "IOTC_LEDS_ROOT",
        long = "leds-root",
        value_name = "path",
        default_value = "/sys/class/leds"
    )]
    pub leds_root: PathBuf,

    /// Name of the red LED under the LED class root
    #[arg(env = "IOTC_LED_RED", long = "led-red", value_name = "name", default_value = "red")]
    pub led_red: String,

    /// Name of the green LED under the LED class root
    #[arg(
        env = "IOTC_LED_GREEN",
        long = "led-green",
        value_name = "name",
        default_value = "green"
    )]
    pub led_green: String,
}

pub fn parse() -> Cli {
    Parser::parse()
}
