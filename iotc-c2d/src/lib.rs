/*
Cloud-to-device messaging.

Payloads received on the command topic are copied out of the MQTT callback
and queued for a single worker. The worker decodes each one into a plain
command or an OTA directive, performs it and publishes an acknowledgment
when the cloud asked for one. Telemetry goes out through the same publish
primitive from its own task.

The MQTT client itself is not part of this crate; anything implementing
`MqttSession` will do.
*/

mod ack;
mod command;
mod event;
mod handler;
mod queue;
mod session;
mod telemetry;
mod topics;

#[cfg(test)]
mod testing;

pub use ack::{AckKind, AckResult, Outcome, messages};
pub use command::{
    CommandError, DeviceCommand, Led, LedDriver, LedState, LogLeds, SysfsLeds, execute,
};
pub use event::{C2dEvent, DecodeError, DecodeErrorKind, OtaDirective, PlainCommand, decode};
pub use handler::{COMMIT_DELAY, CommandHandler, HandlerConfig};
pub use queue::{
    ENQUEUE_TIMEOUT, EnqueueError, Inbox, MAX_PAYLOAD_LEN, PendingCommand, QUEUE_DEPTH, Worker,
    channel, command_channel,
};
pub use session::{
    MqttSession, PUBLISH_CONFIRM_TIMEOUT, PublishError, Publisher, QoS, SUBSCRIBE_ATTEMPTS,
    SessionError,
};
pub use telemetry::{TelemetryPublisher, TelemetryRecord, encode_telemetry};
pub use topics::{Topics, TopicFormats};
