use iotc_util::types::DeviceId;
use serde::{Deserialize, Serialize};

const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

/// Topic templates, `{device_id}` is replaced by the device id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicFormats {
    pub command: String,
    pub telemetry: String,
    pub ack: String,
}

impl Default for TopicFormats {
    fn default() -> Self {
        Self {
            command: "iot/{device_id}/cmd".to_owned(),
            telemetry: "$aws/rules/msg_d2c_rpt/{device_id}/2.1/0".to_owned(),
            ack: "$aws/rules/msg_d2c_ack/{device_id}/2.1/6".to_owned(),
        }
    }
}

impl TopicFormats {
    pub fn resolve(&self, device_id: &DeviceId) -> Topics {
        let fill = |format: &str| format.replace(DEVICE_ID_PLACEHOLDER, device_id);
        Topics {
            command: fill(&self.command),
            telemetry: fill(&self.telemetry),
            ack: fill(&self.ack),
        }
    }
}

/// The topics of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Cloud-to-device messages, subscribed
    pub command: String,
    pub telemetry: String,
    pub ack: String,
}

impl Topics {
    pub fn for_device(device_id: &DeviceId) -> Self {
        TopicFormats::default().resolve(device_id)
    }
}
