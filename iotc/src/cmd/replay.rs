use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};

use super::updater;
use crate::c2d::{
    CommandHandler, ENQUEUE_TIMEOUT, LedDriver, LogLeds, PendingCommand, Publisher, QUEUE_DEPTH,
    SUBSCRIBE_ATTEMPTS, SysfsLeds, TelemetryPublisher, TelemetryRecord, channel, command_channel,
};
use crate::cli::ReplayArgs;
use crate::config::{DeviceConfig, LedBackend, OtaConfig};
use crate::console::ConsoleSession;
use crate::util::config;
use crate::util::store::Store;

/// Feed stdin lines to the command worker as if they arrived on the command
/// topic
#[instrument(name = "replay", skip_all, err)]
pub async fn replay(args: ReplayArgs, store: &Store) -> Result<()> {
    let device = DeviceConfig::resolve(config::load(store).await?, &args.device)?;
    let ota = config::load::<OtaConfig>(store)
        .await?
        .unwrap_or_default()
        .apply(&args.ota);
    let topics = device.topics.resolve(&device.device_id);
    info!(
        device_id = %device.device_id,
        platform = ?device.platform,
        version = %device.firmware_version,
        "starting"
    );

    let publisher = Publisher::new(Arc::new(ConsoleSession::stdout()));
    publisher
        .subscribe_with_retry(&topics.command, SUBSCRIBE_ATTEMPTS)
        .await?;

    let leds: Arc<dyn LedDriver> = match args.leds {
        LedBackend::Log => Arc::new(LogLeds::default()),
        LedBackend::Sysfs => Arc::new(SysfsLeds::new(
            args.leds_root,
            args.led_red,
            args.led_green,
        )),
    };
    let handler = CommandHandler::new(
        publisher.clone(),
        topics.ack,
        leds,
        Arc::new(updater(&ota).await?),
        ota.handler_config(&device.firmware_version),
    );

    let (telemetry_inbox, telemetry_worker) = channel(QUEUE_DEPTH, ENQUEUE_TIMEOUT);
    let telemetry = TelemetryPublisher::new(
        publisher,
        topics.telemetry,
        device.firmware_version.clone(),
    );
    let telemetry = tokio::spawn(telemetry.run(telemetry_worker));
    telemetry_inbox
        .offer(TelemetryRecord::new().with("status", "online"))
        .await?;
    drop(telemetry_inbox);

    let (inbox, worker) = command_channel();
    let worker = tokio::spawn(handler.run(worker));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = inbox.offer(PendingCommand::from_payload(line.as_bytes())).await {
            warn!("message dropped: {e}");
        }
    }

    // let the worker drain the queue
    drop(inbox);
    worker.await?;
    telemetry.await?;
    Ok(())
}
