//! Sync protocol message types and envelope framing.
//!
//! Seven message codes over a small closed payload enum
//! (`EnvelopeValue`), serialized with `ciborium`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gossipkv_core::{Key, Row, Version};

use crate::error::{Result, SyncError};

/// The message's wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    PeerDiscoveryRequest = 1,
    PeerDiscoveryResponse = 2,
    SnapshotRequest = 3,
    SnapshotResponse = 4,
    Digest = 5,
    RequestRows = 6,
    Rows = 7,
}

/// Dispatch priority. Ordering across priorities is host-dependent; the
/// engine itself assumes none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
}

/// A broadcast-style channel the host scripting environment exposes.
/// Unicast delivery (`WHISPER`) is not a channel; it targets a specific
/// peer and is represented directly on [`crate::broker::ChannelBroker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastChannel {
    Guild,
    Raid,
    Party,
    Shout,
}

/// A per-table, per-key summary of version metadata: `{clock, peer,
/// tombstone?}` without the row's data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub clock: u64,
    pub tables: BTreeMap<String, BTreeMap<Key, Version>>,
}

/// A per-table set of keys the sender is missing, sent in response to a
/// [`Digest`] that revealed a gap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsRequest {
    pub tables: BTreeMap<String, BTreeSet<Key>>,
}

/// A per-table map of key to full row (data and version), sent in
/// answer to a [`RowsRequest`]. Also used verbatim as the payload of
/// `SnapshotResponse`: a snapshot is simply the largest possible `Rows`
/// message, every table's every row rather than a requested subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsPayload {
    pub tables: BTreeMap<String, BTreeMap<Key, Row>>,
}

/// The envelope's typed payload. Variants line up 1:1 with
/// [`MessageType`]; `Empty` covers `PeerDiscoveryRequest` and
/// `SnapshotRequest`, which carry no data of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnvelopeValue {
    Empty,
    Clock(u64),
    Digest(Digest),
    RequestRows(RowsRequest),
    Rows(RowsPayload),
    Snapshot(RowsPayload),
}

/// `{type, peerId, data?}`: the full wire unit exchanged between
/// peers. `peer_id` is always the sender's identity,
/// never the recipient's — unicast/broadcast targeting is a property of
/// the transport call, not the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub peer_id: String,
    pub data: EnvelopeValue,
}

/// Encode an envelope for transmission over the channel broker.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(envelope, &mut buf).map_err(|e| SyncError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode an envelope received from the channel broker. A failure here
/// is a network-data error: the caller should log and drop it, not
/// propagate it.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope> {
    ciborium::de::from_reader(bytes).map_err(|e| SyncError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossipkv_core::Version;

    #[test]
    fn envelope_round_trips_through_cbor() {
        let envelope = Envelope {
            message_type: MessageType::PeerDiscoveryResponse,
            peer_id: "p1".to_string(),
            data: EnvelopeValue::Clock(7),
        };
        let bytes = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded.message_type, MessageType::PeerDiscoveryResponse);
        assert_eq!(decoded.peer_id, "p1");
        assert!(matches!(decoded.data, EnvelopeValue::Clock(7)));
    }

    #[test]
    fn digest_round_trips_with_version_entries() {
        let key = Key::Str("alice".into());
        let version = Version::from_parts(3, "p2".into(), false).unwrap();
        let mut tables = BTreeMap::new();
        let mut entries = BTreeMap::new();
        entries.insert(key.clone(), version.clone());
        tables.insert("Users".to_string(), entries);
        let digest = Digest { clock: 3, tables };

        let envelope = Envelope {
            message_type: MessageType::Digest,
            peer_id: "p2".to_string(),
            data: EnvelopeValue::Digest(digest.clone()),
        };
        let bytes = encode_envelope(&envelope).unwrap();
        let decoded = decode_envelope(&bytes).unwrap();
        match decoded.data {
            EnvelopeValue::Digest(d) => assert_eq!(d, digest),
            _ => panic!("expected Digest payload"),
        }
    }

    #[test]
    fn decode_rejects_garbage_bytes() {
        assert!(decode_envelope(&[0xff, 0x00, 0x01]).is_err());
    }
}
