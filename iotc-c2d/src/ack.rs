use serde::Serialize;

/// Ack messages understood by the cloud console
pub mod messages {
    pub const COMMAND_OK: &str = "Command OK";
    pub const COMMAND_ERROR: &str = "Command error";
    pub const NOT_IMPLEMENTED: &str = "Not implemented";
    pub const INTERNAL_ERROR: &str = "Internal error";
    pub const OTA_OK: &str = "OTA OK";
    pub const OTA_UP_TO_DATE: &str = "Firmware is up to date";
    pub const OTA_DOWNLOAD_FAILED: &str = "OTA download failed";
    pub const OTA_NO_URL: &str = "OTA has no URL";
}

/// What is being acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Command,
    Ota,
}

impl AckKind {
    fn wire_type(&self) -> u8 {
        match self {
            AckKind::Command => 0,
            AckKind::Ota => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    SuccessWithAck,
    Failed,
}

/// The acknowledgment for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckResult {
    pub ack_id: Option<String>,
    pub kind: AckKind,
    pub outcome: Outcome,
    pub message: String,
}

#[derive(Serialize)]
struct AckEnvelope<'a> {
    d: AckBody<'a>,
}

#[derive(Serialize)]
struct AckBody<'a> {
    ack: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    st: u8,
    msg: &'a str,
}

impl AckResult {
    pub fn new(
        ack_id: Option<String>,
        kind: AckKind,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ack_id,
            kind,
            outcome,
            message: message.into(),
        }
    }

    /// Status code sent on the wire
    pub fn status_code(&self) -> u8 {
        match (self.kind, self.outcome) {
            (AckKind::Command, Outcome::SuccessWithAck) => 7,
            (_, Outcome::Failed) => 4,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome != Outcome::Failed
    }

    /// The JSON payload to publish, `None` if no ack was requested
    pub fn to_payload(&self) -> Option<Vec<u8>> {
        let ack = self.ack_id.as_deref()?;
        let envelope = AckEnvelope {
            d: AckBody {
                ack,
                kind: self.kind.wire_type(),
                st: self.status_code(),
                msg: &self.message,
            },
        };
        serde_json::to_vec(&envelope).ok()
    }
}
