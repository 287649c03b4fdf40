//! Fundamental data structures shared by the listener, dispatcher, and decoder.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Emitting contract address of a log event.
pub type Address = primitive_types::H160;

/// Indexed log topic (event signature or indexed argument).
pub type Topic = primitive_types::H256;

/// Block or transaction hash.
pub type Hash = primitive_types::H256;

/// Raw envelope delivered by the chain subscription.
///
/// Consumed exactly once by the dispatcher and then discarded; nothing in
/// this crate retains notifications after processing.
#[derive(Debug, Clone)]
pub struct Notification {
    payload: Bytes,
}

impl Notification {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Parse the envelope payload into an [`EventLog`].
    pub fn unmarshal(&self) -> Result<EventLog, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Structured form of a notification: one emitted log record with its
/// block and transaction context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(with = "hex_data")]
    pub data: Bytes,
    #[serde(default)]
    pub block_hash: Option<Hash>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<Hash>,
    #[serde(default)]
    pub log_index: Option<u64>,
}

/// Tag selecting how a watcher's events are decoded into an [`Output`].
///
/// Only the two log kinds participate in subscription and dispatch. The
/// remaining kinds are scheduler- and web-triggered job initiators that
/// share the same persisted representation but never produce log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherKind {
    RawLog,
    EncodedLog,
    Cron,
    RunAt,
    Web,
}

impl WatcherKind {
    /// Whether this kind observes chain log events.
    pub fn is_log(self) -> bool {
        matches!(self, Self::RawLog | Self::EncodedLog)
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawLog => write!(f, "raw_log"),
            Self::EncodedLog => write!(f, "encoded_log"),
            Self::Cron => write!(f, "cron"),
            Self::RunAt => write!(f, "run_at"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// Opaque identifier of a persisted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a persisted watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatcherId(String);

impl WatcherId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted declaration that a job wants events from a given address
/// under a given decode kind. Read-only from this crate's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watcher {
    pub id: WatcherId,
    pub job_id: JobId,
    pub kind: WatcherKind,
    pub address: Address,
}

/// A named unit of work holding zero or more watchers.
///
/// Jobs are created and persisted externally; this crate only reads them at
/// startup and by id lookup during dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub watchers: Vec<Watcher>,
}

impl Job {
    /// Iterate the job's watchers restricted to a single kind.
    pub fn watchers_of_kind(&self, kind: WatcherKind) -> impl Iterator<Item = &Watcher> {
        self.watchers.iter().filter(move |w| w.kind == kind)
    }
}

/// Schema-less key/value result extracted from an [`EventLog`], handed to
/// the run engine as the seed input for a job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Output(serde_json::Map<String, serde_json::Value>);

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.0.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Output {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Serializes a raw payload as a 0x-prefixed hex string.
mod hex_data {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmarshal_event_log() {
        let notification = Notification::new(
            r#"{
                "address": "0x1111111111111111111111111111111111111111",
                "topics": ["0x2222222222222222222222222222222222222222222222222222222222222222"],
                "data": "0xdeadbeef",
                "blockNumber": 42
            }"#,
        );

        let log = notification.unmarshal().unwrap();
        assert_eq!(log.address, Address::repeat_byte(0x11));
        assert_eq!(log.topics, vec![Topic::repeat_byte(0x22)]);
        assert_eq!(log.data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(log.block_number, Some(42));
        assert_eq!(log.block_hash, None);
    }

    #[test]
    fn test_unmarshal_rejects_malformed_payload() {
        let notification = Notification::new(&b"not json"[..]);
        assert!(notification.unmarshal().is_err());
    }

    #[test]
    fn test_event_log_serde_round_trip() {
        let log = EventLog {
            address: Address::repeat_byte(0xab),
            topics: vec![Topic::repeat_byte(0x01)],
            data: Bytes::from_static(&[0x00, 0xff]),
            block_hash: Some(Hash::repeat_byte(0x02)),
            block_number: Some(7),
            transaction_hash: None,
            log_index: Some(0),
        };

        let encoded = serde_json::to_string(&log).unwrap();
        assert!(encoded.contains("\"data\":\"0x00ff\""));

        let decoded: EventLog = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, log);
    }

    #[test]
    fn test_watchers_of_kind_filters() {
        let address = Address::repeat_byte(0x33);
        let job = Job {
            id: JobId::new("job-1"),
            name: None,
            watchers: vec![
                Watcher {
                    id: WatcherId::new("w-1"),
                    job_id: JobId::new("job-1"),
                    kind: WatcherKind::RawLog,
                    address,
                },
                Watcher {
                    id: WatcherId::new("w-2"),
                    job_id: JobId::new("job-1"),
                    kind: WatcherKind::Cron,
                    address,
                },
            ],
        };

        let raw: Vec<_> = job.watchers_of_kind(WatcherKind::RawLog).collect();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, WatcherId::new("w-1"));
        assert_eq!(job.watchers_of_kind(WatcherKind::EncodedLog).count(), 0);
    }

    #[test]
    fn test_watcher_kind_display() {
        assert_eq!(WatcherKind::RawLog.to_string(), "raw_log");
        assert_eq!(WatcherKind::EncodedLog.to_string(), "encoded_log");
        assert!(WatcherKind::RawLog.is_log());
        assert!(!WatcherKind::Web.is_log());
    }

    #[test]
    fn test_output_accessors() {
        let mut output = Output::new();
        assert!(output.is_empty());
        output.insert("a", serde_json::json!(1));
        assert_eq!(output.len(), 1);
        assert_eq!(output.get("a"), Some(&serde_json::json!(1)));
    }
}
