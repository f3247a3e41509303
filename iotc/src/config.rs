use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::c2d::{COMMIT_DELAY, HandlerConfig, TopicFormats};
use crate::cli::{DeviceArgs, OtaArgs};
use crate::ota::{
    CommandActivator, DownloadConfig, HttpsConfig, ImageActivator, NoopActivator,
    PROGRESS_INTERVAL,
};
use crate::util::config::StoredConfig;
use crate::util::dirs::image_dir;
use crate::util::json::millis;
use crate::util::types::DeviceId;

/// Cloud platform hosting the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Aws,
    Azure,
}

/// Where LED commands are sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LedBackend {
    /// Only log them
    #[default]
    Log,
    /// The Linux LED class in sysfs
    Sysfs,
}

fn default_firmware_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

/// Identity of the device on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: DeviceId,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_endpoint: Option<String>,

    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,

    #[serde(default)]
    pub topics: TopicFormats,
}

impl StoredConfig for DeviceConfig {
    fn kind() -> &'static str {
        "device"
    }
}

impl DeviceConfig {
    /// Combine the stored config with command line overrides
    pub fn resolve(stored: Option<DeviceConfig>, args: &DeviceArgs) -> Result<Self> {
        let mut config = match (stored, &args.device_id) {
            (Some(mut stored), Some(device_id)) => {
                stored.device_id = device_id.clone();
                stored
            }
            (Some(stored), None) => stored,
            (None, Some(device_id)) => DeviceConfig {
                device_id: device_id.clone(),
                platform: Platform::default(),
                cpid: None,
                env: None,
                mqtt_endpoint: None,
                firmware_version: default_firmware_version(),
                topics: TopicFormats::default(),
            },
            (None, None) => {
                return Err(anyhow!(
                    "no device id configured, use `iotc configure --device-id <id>`"
                ));
            }
        };

        if let Some(platform) = args.platform {
            config.platform = platform;
        }
        if let Some(cpid) = &args.cpid {
            config.cpid = Some(cpid.clone());
        }
        if let Some(env) = &args.env {
            config.env = Some(env.clone());
        }
        if let Some(endpoint) = &args.mqtt_endpoint {
            config.mqtt_endpoint = Some(endpoint.clone());
        }
        if let Some(version) = &args.firmware_version {
            config.firmware_version = version.clone();
        }

        Ok(config)
    }
}

/// Firmware update settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    pub image_dir: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_image_name: Option<String>,

    #[serde(with = "millis")]
    pub commit_delay: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activate_command: Option<String>,

    pub chunk_size: usize,

    pub retry_budget: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<PathBuf>,
}

impl Default for OtaConfig {
    fn default() -> Self {
        let download = DownloadConfig::default();
        Self {
            image_dir: image_dir(),
            default_image_name: None,
            commit_delay: COMMIT_DELAY,
            activate_command: None,
            chunk_size: download.chunk_size,
            retry_budget: download.retry_budget,
            root_ca: None,
        }
    }
}

impl StoredConfig for OtaConfig {
    fn kind() -> &'static str {
        "ota"
    }
}

impl OtaConfig {
    /// Apply command line overrides
    pub fn apply(mut self, args: &OtaArgs) -> Self {
        if let Some(dir) = &args.image_dir {
            self.image_dir = dir.clone();
        }
        if let Some(name) = &args.default_image_name {
            self.default_image_name = Some(name.clone());
        }
        if let Some(delay) = args.commit_delay {
            self.commit_delay = delay;
        }
        if let Some(command) = &args.activate_command {
            self.activate_command = Some(command.clone());
        }
        if let Some(chunk_size) = args.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(budget) = args.retry_budget {
            self.retry_budget = budget;
        }
        if let Some(path) = &args.root_ca {
            self.root_ca = Some(path.clone());
        }
        self
    }

    pub fn download_config(&self) -> Result<DownloadConfig> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk size must be larger than zero"));
        }
        Ok(DownloadConfig {
            chunk_size: self.chunk_size,
            retry_budget: self.retry_budget,
            progress_interval: PROGRESS_INTERVAL,
        })
    }

    pub async fn https_config(&self) -> Result<HttpsConfig> {
        let config = HttpsConfig::default();
        let Some(path) = &self.root_ca else {
            return Ok(config);
        };

        let pem = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read root certificates from {}", path.display()))?;
        Ok(config.with_pem_roots(&pem)?)
    }

    pub fn activator(&self) -> Box<dyn ImageActivator> {
        match self
            .activate_command
            .as_deref()
            .and_then(CommandActivator::from_command_line)
        {
            Some(activator) => Box::new(activator),
            None => Box::new(NoopActivator),
        }
    }

    pub fn handler_config(&self, running_version: &str) -> HandlerConfig {
        HandlerConfig {
            running_version: running_version.to_owned(),
            commit_delay: self.commit_delay,
            default_image_name: self.default_image_name.clone(),
        }
    }
}
