use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::ack::AckKind;

/// A device command sent as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCommand {
    pub ack_id: Option<String>,
    pub command: String,
}

/// A request to install a firmware image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaDirective {
    pub ack_id: Option<String>,
    /// Version of the offered firmware
    pub version: String,
    pub hardware: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
}

/// A decoded cloud-to-device message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C2dEvent {
    PlainCommand(PlainCommand),
    OtaDirective(OtaDirective),
}

impl C2dEvent {
    /// The id to acknowledge the event with, if the cloud expects an ack
    pub fn ack_id(&self) -> Option<&str> {
        match self {
            C2dEvent::PlainCommand(cmd) => cmd.ack_id.as_deref(),
            C2dEvent::OtaDirective(ota) => ota.ack_id.as_deref(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("invalid message: {0}")]
    Json(String),

    #[error("unknown message type {0}")]
    UnknownType(u64),

    #[error("missing field '{0}'")]
    MissingField(&'static str),
}

/// A payload that could not be decoded. Carries the ack id when the payload
/// had a readable one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct DecodeError {
    pub ack_id: Option<String>,
    /// Ack type matching the message type the payload declared
    pub ack_kind: AckKind,
    pub kind: DecodeErrorKind,
}

const COMMAND_TYPE_DEVICE: u64 = 0;
const COMMAND_TYPE_OTA: u64 = 1;

#[derive(Deserialize)]
struct RawEvent {
    ct: u64,
    cmd: Option<String>,
    sw: Option<String>,
    hw: Option<String>,
    #[serde(default)]
    urls: Vec<RawUrl>,
}

#[derive(Deserialize)]
struct RawUrl {
    url: String,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

/// Decode a cloud-to-device payload
pub fn decode(payload: &[u8]) -> Result<C2dEvent, DecodeError> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| DecodeError {
        ack_id: None,
        ack_kind: AckKind::Command,
        kind: DecodeErrorKind::Json(e.to_string()),
    })?;

    // read the ack id first so that a bad event can still be acknowledged
    let ack_id = value
        .get("ack")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned);
    let ack_kind = match value.get("ct").and_then(Value::as_u64) {
        Some(COMMAND_TYPE_OTA) => AckKind::Ota,
        _ => AckKind::Command,
    };
    let fail = |kind| DecodeError {
        ack_id: ack_id.clone(),
        ack_kind,
        kind,
    };

    let raw: RawEvent =
        serde_json::from_value(value).map_err(|e| fail(DecodeErrorKind::Json(e.to_string())))?;

    match raw.ct {
        COMMAND_TYPE_DEVICE => {
            let command = raw.cmd.ok_or_else(|| fail(DecodeErrorKind::MissingField("cmd")))?;
            Ok(C2dEvent::PlainCommand(PlainCommand { ack_id, command }))
        }
        COMMAND_TYPE_OTA => {
            let version = raw.sw.ok_or_else(|| fail(DecodeErrorKind::MissingField("sw")))?;
            let (url, file_name) = raw
                .urls
                .into_iter()
                .next()
                .map(|u| (Some(u.url), u.file_name))
                .unwrap_or_default();
            Ok(C2dEvent::OtaDirective(OtaDirective {
                ack_id,
                version,
                hardware: raw.hw,
                url,
                file_name,
            }))
        }
        other => Err(fail(DecodeErrorKind::UnknownType(other))),
    }
}
