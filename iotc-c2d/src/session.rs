use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

/// How long to wait for the broker to confirm a publish
pub const PUBLISH_CONFIRM_TIMEOUT: Duration = Duration::from_millis(1000);

/// Subscription attempts before giving up
pub const SUBSCRIBE_ATTEMPTS: u32 = 20;

const SUBSCRIBE_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// An established MQTT session, owned and kept alive by someone else
#[async_trait]
pub trait MqttSession: Send + Sync {
    /// Queue a publish. The returned receiver resolves once the broker
    /// confirmed delivery.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<oneshot::Receiver<()>, SessionError>;

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError>;

    fn is_connected(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no confirmation after {0:?}")]
    Timeout(Duration),

    #[error("publish was dropped by the session")]
    Dropped,
}

/// Publish-and-confirm on top of an [`MqttSession`]
#[derive(Clone)]
pub struct Publisher {
    session: Arc<dyn MqttSession>,
    confirm_timeout: Duration,
}

impl Publisher {
    pub fn new(session: Arc<dyn MqttSession>) -> Self {
        Self {
            session,
            confirm_timeout: PUBLISH_CONFIRM_TIMEOUT,
        }
    }

    pub fn with_confirm_timeout(mut self, confirm_timeout: Duration) -> Self {
        self.confirm_timeout = confirm_timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Publish `payload` and wait until the broker confirms it
    #[instrument(skip(self, payload), fields(len = payload.len()), err)]
    pub async fn publish_and_wait(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if !self.session.is_connected() {
            return Err(PublishError::NotConnected);
        }

        let confirmed = self
            .session
            .publish(topic, payload, QoS::AtLeastOnce)
            .await?;

        match timeout(self.confirm_timeout, confirmed).await {
            Ok(Ok(())) => {
                debug!("publish confirmed");
                Ok(())
            }
            Ok(Err(_)) => Err(PublishError::Dropped),
            Err(_) => Err(PublishError::Timeout(self.confirm_timeout)),
        }
    }

    /// Subscribe to `topic`, retrying up to `attempts` times
    #[instrument(skip(self))]
    pub async fn subscribe_with_retry(&self, topic: &str, attempts: u32) -> Result<(), SessionError> {
        let mut tries = 0;
        loop {
            tries += 1;
            match self.session.subscribe(topic, QoS::AtLeastOnce).await {
                Ok(()) => {
                    debug!("subscribed");
                    return Ok(());
                }
                Err(e) if tries < attempts => {
                    warn!("subscribe attempt {tries}/{attempts} failed: {e}");
                    sleep(SUBSCRIBE_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
