use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::session::{MqttSession, QoS, SessionError};

#[derive(Clone, Copy)]
pub enum Confirm {
    Immediately,
    Never,
    Drop,
}

/// Session recording every publish
pub struct RecordingSession {
    confirm: Confirm,
    connected: AtomicBool,
    published: Mutex<Vec<(String, String)>>,
    pending: Mutex<Vec<oneshot::Sender<()>>>,
    failing_subscribes: AtomicU32,
    subscribe_calls: AtomicU32,
}

impl RecordingSession {
    pub fn new(confirm: Confirm) -> Arc<Self> {
        Arc::new(Self {
            confirm,
            connected: AtomicBool::new(true),
            published: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            failing_subscribes: AtomicU32::new(0),
            subscribe_calls: AtomicU32::new(0),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_subscribes(&self, count: u32) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Published payloads parsed as JSON
    pub fn published_json(&self) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .map(|(_, payload)| serde_json::from_str(&payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl MqttSession for RecordingSession {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        _: QoS,
    ) -> Result<oneshot::Receiver<()>, SessionError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), String::from_utf8(payload).unwrap()));

        let (tx, rx) = oneshot::channel();
        match self.confirm {
            Confirm::Immediately => {
                let _ = tx.send(());
            }
            Confirm::Never => self.pending.lock().unwrap().push(tx),
            Confirm::Drop => drop(tx),
        }
        Ok(rx)
    }

    async fn subscribe(&self, topic: &str, _: QoS) -> Result<(), SessionError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_subscribes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_subscribes.store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::Rejected(format!("subscribe to {topic} refused")));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
