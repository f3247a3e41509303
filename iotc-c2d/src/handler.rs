use std::sync::Arc;
use std::time::Duration;

use iotc_ota::{DownloadReport, FirmwareUpdater, ImageSource, InvalidImageUrl, needs_update};
use tokio::time::sleep;
use tracing::{Span, debug, error, field, info, instrument, warn};

use crate::ack::{AckKind, AckResult, Outcome, messages};
use crate::command::{CommandError, DeviceCommand, LedDriver, execute};
use crate::event::{C2dEvent, OtaDirective, PlainCommand, decode};
use crate::queue::{PendingCommand, Worker};
use crate::session::Publisher;

/// Time between acknowledging a downloaded image and activating it
pub const COMMIT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Version of the firmware currently running
    pub running_version: String,
    pub commit_delay: Duration,
    /// Stored image name when a directive names none
    pub default_image_name: Option<String>,
}

impl HandlerConfig {
    pub fn new(running_version: impl Into<String>) -> Self {
        Self {
            running_version: running_version.into(),
            commit_delay: COMMIT_DELAY,
            default_image_name: None,
        }
    }
}

/// Performs cloud-to-device events and acknowledges them
pub struct CommandHandler {
    publisher: Publisher,
    ack_topic: String,
    leds: Arc<dyn LedDriver>,
    updater: Arc<dyn FirmwareUpdater>,
    config: HandlerConfig,
}

impl CommandHandler {
    pub fn new(
        publisher: Publisher,
        ack_topic: impl Into<String>,
        leds: Arc<dyn LedDriver>,
        updater: Arc<dyn FirmwareUpdater>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            publisher,
            ack_topic: ack_topic.into(),
            leds,
            updater,
            config,
        }
    }

    /// Handle queued commands one at a time until the queue closes
    pub async fn run(self, mut worker: Worker<PendingCommand>) {
        info!("command worker started");
        while let Some(cmd) = worker.next().await {
            if cmd.was_truncated() {
                warn!(len = cmd.len(), "command payload was truncated");
            }
            self.handle(cmd.payload()).await;
        }
        info!("command worker stopped");
    }

    /// Handle one payload.
    ///
    /// Returns the acknowledgment built for the event, whether or not the
    /// cloud asked for one, or `None` for payloads that could not even be
    /// attributed to a request.
    #[instrument(name = "command", skip_all, fields(ack_id = field::Empty))]
    pub async fn handle(&self, payload: &[u8]) -> Option<AckResult> {
        let event = match decode(payload) {
            Ok(event) => event,
            Err(e) => {
                let Some(ack_id) = e.ack_id else {
                    warn!("dropping unreadable message: {}", e.kind);
                    return None;
                };
                Span::current().record("ack_id", ack_id.as_str());
                warn!("failed to decode message: {}", e.kind);

                let ack = AckResult::new(
                    Some(ack_id),
                    e.ack_kind,
                    Outcome::Failed,
                    messages::INTERNAL_ERROR,
                );
                self.send_ack(&ack).await;
                return Some(ack);
            }
        };
        if let Some(ack_id) = event.ack_id() {
            Span::current().record("ack_id", ack_id);
        }

        match event {
            C2dEvent::PlainCommand(cmd) => {
                let ack = self.on_command(cmd);
                self.send_ack(&ack).await;
                Some(ack)
            }
            C2dEvent::OtaDirective(ota) => {
                let (ack, downloaded) = self.on_ota(ota).await;
                self.send_ack(&ack).await;
                if let Some(report) = downloaded {
                    self.commit(&report).await;
                }
                Some(ack)
            }
        }
    }

    fn on_command(&self, cmd: PlainCommand) -> AckResult {
        debug!("received command '{}'", cmd.command);
        let (outcome, message) = match DeviceCommand::parse(&cmd.command) {
            Ok(command) => match execute(command, self.leds.as_ref()) {
                Ok(()) => (Outcome::SuccessWithAck, messages::COMMAND_OK),
                Err(e) => {
                    warn!("command '{}' failed: {e}", cmd.command);
                    (Outcome::Failed, messages::COMMAND_ERROR)
                }
            },
            Err(CommandError::NotImplemented(text)) => {
                warn!("command '{text}' not implemented");
                (Outcome::Failed, messages::NOT_IMPLEMENTED)
            }
            Err(e) => {
                warn!("{e}");
                (Outcome::Failed, messages::COMMAND_ERROR)
            }
        };

        AckResult::new(cmd.ack_id, AckKind::Command, outcome, message)
    }

    /// Download the offered image if it is newer. Returns the ack and, when
    /// there is something to activate, the download report.
    async fn on_ota(&self, ota: OtaDirective) -> (AckResult, Option<DownloadReport>) {
        let ack = |outcome: Outcome, message: &str| {
            AckResult::new(ota.ack_id.clone(), AckKind::Ota, outcome, message)
        };

        let Some(url) = ota.url.as_deref() else {
            warn!("OTA directive for {} has no URL", ota.version);
            return (ack(Outcome::Failed, messages::OTA_NO_URL), None);
        };

        let running = &self.config.running_version;
        if !needs_update(running, &ota.version) {
            info!(
                "running version {running}, offered {}, nothing to update",
                ota.version
            );
            return (ack(Outcome::Success, messages::OTA_UP_TO_DATE), None);
        }
        let file_name = ota
            .file_name
            .as_deref()
            .or(self.config.default_image_name.as_deref());
        let source = match image_source(url, file_name) {
            Ok(source) => source,
            Err(e) => {
                error!("OTA download failed: {e}");
                return (ack(Outcome::Failed, messages::OTA_DOWNLOAD_FAILED), None);
            }
        };

        info!("updating firmware {running} -> {} from {source}", ota.version);
        match self.updater.download(&source).await {
            Ok(report) if report.is_empty() => {
                warn!("offered image is empty, it will not be activated");
                (ack(Outcome::Success, messages::OTA_OK), None)
            }
            Ok(report) => (ack(Outcome::Success, messages::OTA_OK), Some(report)),
            Err(e) => {
                error!("OTA download failed: {e}");
                (ack(Outcome::Failed, messages::OTA_DOWNLOAD_FAILED), None)
            }
        }
    }

    async fn commit(&self, report: &DownloadReport) {
        info!(
            "activating {} in {:?}",
            report.file_name, self.config.commit_delay
        );
        sleep(self.config.commit_delay).await;
        if let Err(e) = self.updater.activate(report).await {
            error!("failed to activate firmware: {e}");
        }
    }

    async fn send_ack(&self, ack: &AckResult) {
        let Some(payload) = ack.to_payload() else {
            debug!("no ack requested");
            return;
        };
        if let Err(e) = self
            .publisher
            .publish_and_wait(&self.ack_topic, payload)
            .await
        {
            warn!("failed to publish ack: {e}");
        }
    }
}

fn image_source(url: &str, file_name: Option<&str>) -> Result<ImageSource, InvalidImageUrl> {
    let source = ImageSource::from_url(url)?;
    match file_name {
        Some(name) => source.with_file_name(name),
        None => Ok(source),
    }
}
