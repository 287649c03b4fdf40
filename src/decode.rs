//! Decode policies turning raw event payloads into structured outputs.

use crate::types::{EventLog, Output, Watcher, WatcherKind};

/// Fixed-layout header length of an encoded log payload: two 32-byte
/// words, convention-dependent and opaque to this crate. The embedded
/// document starts strictly after this offset.
pub const ENCODED_HEADER_LEN: usize = 64;

/// Word size the embedded document is null-padded to.
pub const WORD_LEN: usize = 32;

/// Decode-time failures, returned to the caller of [`decode`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The watcher kind has no log decode policy. Terminal; not retried.
    #[error("watcher kind {0} has no log decode policy")]
    UnsupportedWatcherKind(WatcherKind),

    /// The payload is shorter than the 64-byte encoded-log header.
    #[error("encoded payload is {len} bytes, shorter than the fixed header")]
    MalformedPayload { len: usize },

    /// The embedded document after the header is not valid JSON.
    #[error("embedded payload document is not valid JSON: {0}")]
    InvalidDocument(#[source] serde_json::Error),

    /// The event log could not be re-encoded as a generic output tree.
    #[error("event log could not be re-encoded as an output: {0}")]
    Reencode(#[source] serde_json::Error),
}

/// Decode an event log into an [`Output`] under the policy selected by
/// `kind`. Pure in `(kind, log)`.
pub fn decode(kind: WatcherKind, log: &EventLog) -> Result<Output, DecodeError> {
    match kind {
        WatcherKind::RawLog => decode_raw(log),
        WatcherKind::EncodedLog => decode_encoded(log),
        WatcherKind::Cron | WatcherKind::RunAt | WatcherKind::Web => {
            Err(DecodeError::UnsupportedWatcherKind(kind))
        }
    }
}

/// Decode an event log under the policy of the watcher that matched it.
pub fn format_log_output(watcher: &Watcher, log: &EventLog) -> Result<Output, DecodeError> {
    decode(watcher.kind, log)
}

/// Lossless structural transform: the log's own fields re-encoded into the
/// generic output schema.
fn decode_raw(log: &EventLog) -> Result<Output, DecodeError> {
    let tree = serde_json::to_value(log).map_err(DecodeError::Reencode)?;
    serde_json::from_value(tree).map_err(DecodeError::Reencode)
}

/// Skip the fixed header, strip the null padding, and parse the embedded
/// JSON document.
fn decode_encoded(log: &EventLog) -> Result<Output, DecodeError> {
    let payload: &[u8] = &log.data;
    if payload.len() < ENCODED_HEADER_LEN {
        return Err(DecodeError::MalformedPayload {
            len: payload.len(),
        });
    }
    let document = trim_trailing_nuls(&payload[ENCODED_HEADER_LEN..]);
    serde_json::from_slice(document).map_err(DecodeError::InvalidDocument)
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Hash, JobId, Topic, WatcherId};
    use bytes::Bytes;

    fn sample_log(data: impl Into<Bytes>) -> EventLog {
        EventLog {
            address: Address::repeat_byte(0x11),
            topics: vec![Topic::repeat_byte(0x22)],
            data: data.into(),
            block_hash: Some(Hash::repeat_byte(0x33)),
            block_number: Some(100),
            transaction_hash: Some(Hash::repeat_byte(0x44)),
            log_index: Some(5),
        }
    }

    fn encoded_payload(document: &[u8]) -> Vec<u8> {
        let mut payload = vec![0u8; ENCODED_HEADER_LEN];
        payload.extend_from_slice(document);
        while payload.len() % WORD_LEN != 0 {
            payload.push(0);
        }
        payload
    }

    #[test]
    fn test_raw_log_is_structural_transform() {
        let log = sample_log(vec![0xde, 0xad]);
        let output = decode(WatcherKind::RawLog, &log).unwrap();

        assert_eq!(
            output.get("address"),
            Some(&serde_json::json!("0x1111111111111111111111111111111111111111"))
        );
        assert_eq!(output.get("data"), Some(&serde_json::json!("0xdead")));
        assert_eq!(output.get("blockNumber"), Some(&serde_json::json!(100)));
    }

    #[test]
    fn test_raw_log_round_trip() {
        let log = sample_log(vec![0x01, 0x02, 0x03]);
        let output = decode(WatcherKind::RawLog, &log).unwrap();

        // The raw transform is lossless: the output re-parses into the same
        // log, which decodes to an equal output.
        let tree = serde_json::to_value(&output).unwrap();
        let reparsed: EventLog = serde_json::from_value(tree).unwrap();
        assert_eq!(reparsed, log);
        assert_eq!(decode(WatcherKind::RawLog, &reparsed).unwrap(), output);
    }

    #[test]
    fn test_encoded_log_embedded_document() {
        let payload = encoded_payload(br#"{"a":1}"#);
        assert_eq!(payload.len() % WORD_LEN, 0);

        let log = sample_log(payload);
        let output = decode(WatcherKind::EncodedLog, &log).unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output.get("a"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_encoded_log_short_payload() {
        let log = sample_log(vec![0u8; 10]);
        let error = decode(WatcherKind::EncodedLog, &log).unwrap_err();
        assert!(matches!(error, DecodeError::MalformedPayload { len: 10 }));
    }

    #[test]
    fn test_encoded_log_garbage_document() {
        let payload = encoded_payload(b"not a document");
        let log = sample_log(payload);
        let error = decode(WatcherKind::EncodedLog, &log).unwrap_err();
        assert!(matches!(error, DecodeError::InvalidDocument(_)));
    }

    #[test]
    fn test_encoded_log_header_only_payload() {
        // Exactly the header and nothing else: no document to parse.
        let log = sample_log(vec![0u8; ENCODED_HEADER_LEN]);
        let error = decode(WatcherKind::EncodedLog, &log).unwrap_err();
        assert!(matches!(error, DecodeError::InvalidDocument(_)));
    }

    #[test]
    fn test_unsupported_watcher_kind() {
        let log = sample_log(Bytes::new());
        for kind in [WatcherKind::Cron, WatcherKind::RunAt, WatcherKind::Web] {
            let error = decode(kind, &log).unwrap_err();
            assert!(matches!(error, DecodeError::UnsupportedWatcherKind(k) if k == kind));
        }
    }

    #[test]
    fn test_format_log_output_uses_watcher_kind() {
        let log = sample_log(encoded_payload(br#"{"b":2}"#));
        let watcher = Watcher {
            id: WatcherId::new("w-1"),
            job_id: JobId::new("job-1"),
            kind: WatcherKind::EncodedLog,
            address: log.address,
        };

        let output = format_log_output(&watcher, &log).unwrap();
        assert_eq!(output.get("b"), Some(&serde_json::json!(2)));
    }
}
