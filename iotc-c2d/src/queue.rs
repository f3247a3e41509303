use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tracing::warn;

/// Commands waiting for the worker at most
pub const QUEUE_DEPTH: usize = 5;

/// How long a producer may wait for room in the queue
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Largest accepted command payload, terminator included
pub const MAX_PAYLOAD_LEN: usize = 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("queue is full")]
    Full,

    #[error("worker has stopped")]
    Closed,
}

/// Producer side of the hand-off queue. Items that cannot be queued are
/// dropped by the producer.
#[derive(Debug)]
pub struct Inbox<T> {
    tx: mpsc::Sender<T>,
    timeout: Duration,
}

impl<T> Clone for Inbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T> Inbox<T> {
    /// Queue `item`, waiting at most the enqueue timeout for room
    pub async fn offer(&self, item: T) -> Result<(), EnqueueError> {
        match self.tx.send_timeout(item, self.timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("queue full, dropping message");
                Err(EnqueueError::Full)
            }
            Err(SendTimeoutError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Queue `item` without waiting
    pub fn try_offer(&self, item: T) -> Result<(), EnqueueError> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("queue full, dropping message");
                Err(EnqueueError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }
}

/// Consumer side of the hand-off queue
#[derive(Debug)]
pub struct Worker<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Worker<T> {
    /// Wait for the next item. Returns `None` once every inbox is gone and
    /// the queue is drained.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Process items one at a time, in order, until the queue closes
    pub async fn run<F, Fut>(mut self, mut process: F)
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(item) = self.rx.recv().await {
            process(item).await;
        }
    }
}

pub fn channel<T>(depth: usize, timeout: Duration) -> (Inbox<T>, Worker<T>) {
    let (tx, rx) = mpsc::channel(depth);
    (Inbox { tx, timeout }, Worker { rx })
}

/// The command queue with its default depth and timeout
pub fn command_channel() -> (Inbox<PendingCommand>, Worker<PendingCommand>) {
    channel(QUEUE_DEPTH, ENQUEUE_TIMEOUT)
}

/// A received command payload, copied out of the network buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    payload: Vec<u8>,
    truncated: bool,
}

impl PendingCommand {
    /// Copy `payload`, keeping at most `MAX_PAYLOAD_LEN - 1` bytes
    pub fn from_payload(payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_PAYLOAD_LEN - 1);
        Self {
            payload: payload[..len].to_vec(),
            truncated: len < payload.len(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}
