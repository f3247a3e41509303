use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::queue::Worker;
use crate::session::{PublishError, Publisher};

/// A set of telemetry fields sampled together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    fields: Map<String, Value>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    d: [Entry<'a>; 1],
}

#[derive(Serialize)]
struct Entry<'a> {
    dt: String,
    d: &'a Map<String, Value>,
}

/// Serialize `record` the way the platform expects it, tagged with the
/// firmware version
pub fn encode_telemetry(
    record: &TelemetryRecord,
    version: &str,
    at: DateTime<Utc>,
) -> serde_json::Result<Vec<u8>> {
    let mut fields = record.fields.clone();
    fields.insert("version".to_owned(), Value::from(version));

    serde_json::to_vec(&Envelope {
        d: [Entry {
            dt: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            d: &fields,
        }],
    })
}

/// Publishes queued telemetry records
pub struct TelemetryPublisher {
    publisher: Publisher,
    topic: String,
    version: String,
}

impl TelemetryPublisher {
    pub fn new(publisher: Publisher, topic: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            version: version.into(),
        }
    }

    pub async fn publish(&self, record: &TelemetryRecord) -> Result<(), PublishError> {
        let payload = match encode_telemetry(record, &self.version, Utc::now()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize telemetry: {e}");
                return Ok(());
            }
        };
        self.publisher.publish_and_wait(&self.topic, payload).await
    }

    /// Publish records as they are queued until the queue closes
    pub async fn run(self, mut worker: Worker<TelemetryRecord>) {
        while let Some(record) = worker.next().await {
            match self.publish(&record).await {
                Ok(()) => debug!("telemetry published"),
                Err(e) => warn!("failed to publish telemetry: {e}"),
            }
        }
    }
}
