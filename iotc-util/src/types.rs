use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Longest device id accepted by the platform
pub const DEVICE_ID_MAX_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDeviceId {
    #[error("device id cannot be empty")]
    Empty,

    #[error("device id is longer than {DEVICE_ID_MAX_LEN} characters")]
    TooLong,

    #[error("device id contains an invalid character {0:?}")]
    InvalidChar(char),
}

/// Unique name of the device on the IoT platform (the "thing name")
///
/// Device ids are interpolated into MQTT topics, so MQTT wildcards and
/// level separators are rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl Deref for DeviceId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = InvalidDeviceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(InvalidDeviceId::Empty);
        }
        if value.chars().count() > DEVICE_ID_MAX_LEN {
            return Err(InvalidDeviceId::TooLong);
        }
        if let Some(c) = value
            .chars()
            .find(|c| matches!(c, '/' | '+' | '#') || c.is_whitespace() || c.is_control())
        {
            return Err(InvalidDeviceId::InvalidChar(c));
        }
        Ok(Self(value))
    }
}

impl FromStr for DeviceId {
    type Err = InvalidDeviceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_owned().try_into()
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_thing_names() {
        let id: DeviceId = "stm32u5-0042".parse().unwrap();
        assert_eq!(id.as_str(), "stm32u5-0042");
    }

    #[test]
    fn it_rejects_topic_breaking_ids() {
        assert_eq!("".parse::<DeviceId>(), Err(InvalidDeviceId::Empty));
        assert_eq!(
            "dev/1".parse::<DeviceId>(),
            Err(InvalidDeviceId::InvalidChar('/'))
        );
        assert_eq!(
            "dev#".parse::<DeviceId>(),
            Err(InvalidDeviceId::InvalidChar('#'))
        );
        assert_eq!(
            "a".repeat(DEVICE_ID_MAX_LEN + 1).parse::<DeviceId>(),
            Err(InvalidDeviceId::TooLong)
        );
    }

    #[test]
    fn it_validates_on_deserialize() {
        assert!(serde_json::from_str::<DeviceId>(r#""ok-id""#).is_ok());
        assert!(serde_json::from_str::<DeviceId>(r#""bad id""#).is_err());
    }
}
