use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::c2d::{MqttSession, QoS, SessionError};

/// A stand-in MQTT session writing every publish to a sink, one
/// `<topic> <payload>` line each. Publishes are confirmed once written.
pub struct ConsoleSession<W = Stdout> {
    out: tokio::sync::Mutex<W>,
    subscriptions: Mutex<Vec<String>>,
}

impl ConsoleSession<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleSession<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: tokio::sync::Mutex::new(out),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl<W> MqttSession for ConsoleSession<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        _: QoS,
    ) -> Result<oneshot::Receiver<()>, SessionError> {
        let mut line = Vec::with_capacity(topic.len() + payload.len() + 2);
        line.extend_from_slice(topic.as_bytes());
        line.push(b' ');
        line.extend_from_slice(&payload);
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| SessionError::Rejected(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| SessionError::Rejected(e.to_string()))?;
        debug!(topic, "published");

        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        Ok(rx)
    }

    async fn subscribe(&self, topic: &str, _: QoS) -> Result<(), SessionError> {
        info!("subscribed to {topic}");
        self.subscriptions
            .lock()
            .map_err(|_| SessionError::Rejected("session state poisoned".into()))?
            .push(topic.to_owned());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_publishes_are_written_as_lines() {
        let session = ConsoleSession::new(Vec::new());

        let confirmed = session
            .publish("iot/dev/ack", br#"{"d":{}}"#.to_vec(), QoS::AtLeastOnce)
            .await
            .unwrap();
        confirmed.await.unwrap();
        session.subscribe("iot/dev/cmd", QoS::AtLeastOnce).await.unwrap();

        let out = session.out.lock().await;
        assert_eq!(String::from_utf8_lossy(&out), "iot/dev/ack {\"d\":{}}\n");
        assert_eq!(session.subscriptions(), vec!["iot/dev/cmd"]);
    }
}
