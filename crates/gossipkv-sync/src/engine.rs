//! The sync engine: message dispatch, discovery, and digest-driven
//! anti-entropy.
//!
//! A message-dispatch state machine, one phase per concern (discovery,
//! digest exchange, row request, row response, snapshot): every inbound
//! envelope is debounced, then routed to exactly one handler by its
//! [`MessageType`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use gossipkv_store::{MergeContext, VersionedStore};

use crate::broker::{broadcast_on_available_channels, ChannelBroker, ChannelEnvironment};
use crate::debounce::{Clock, DebounceBucket, MonotonicSeconds};
use crate::digest::{build_digest, build_rows_response, build_snapshot, compute_missing};
use crate::error::Result;
use crate::messages::{decode_envelope, encode_envelope, BroadcastChannel, Envelope, EnvelopeValue, MessageType, Priority};

/// What the engine knows about a peer it has heard from. Ephemeral:
/// never persisted, rebuilt fresh each process lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerInfo {
    pub last_known_clock: u64,
    pub is_new: bool,
}

struct DiscoveryState {
    start_time: Option<MonotonicSeconds>,
    last_response_time: Option<MonotonicSeconds>,
    fired_this_cycle: bool,
    ever_completed: bool,
}

impl Default for DiscoveryState {
    fn default() -> Self {
        DiscoveryState {
            start_time: None,
            last_response_time: None,
            fired_this_cycle: false,
            ever_completed: false,
        }
    }
}

struct Inner {
    store: Rc<VersionedStore>,
    broker: Rc<dyn ChannelBroker>,
    env: Rc<dyn ChannelEnvironment>,
    clock: Rc<dyn Clock>,
    local_peer: String,
    channels: Vec<BroadcastChannel>,
    quiet_period: MonotonicSeconds,
    max_time: MonotonicSeconds,
    debounce_window: MonotonicSeconds,
    debounce: DebounceBucket,
    peers: RefCell<HashMap<String, PeerInfo>>,
    discovery: RefCell<DiscoveryState>,
    on_discovery_complete: RefCell<Option<Box<dyn FnMut(bool)>>>,
}

/// A cheap, `Clone`-able handle onto the shared engine state. Cloning an
/// engine shares the same store, peer directory, and debounce buckets —
/// it does not duplicate them — the same way `gossipkv_store`'s
/// `SubscriptionHandle` shares a registry via `Rc`.
///
/// `broker`, `env`, and `clock` are trait objects rather than generic
/// parameters: like `ChannelBroker`/`ChannelEnvironment`, exactly one
/// host-provided `Clock` is wired in at construction and never swapped,
/// so there is nothing for monomorphization to buy here — and a
/// non-generic `SyncEngine` lets `DatabaseInstance`/`Registry` stay
/// non-generic too.
pub struct SyncEngine {
    inner: Rc<Inner>,
}

impl Clone for SyncEngine {
    fn clone(&self) -> Self {
        SyncEngine { inner: Rc::clone(&self.inner) }
    }
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Rc<VersionedStore>,
        broker: Rc<dyn ChannelBroker>,
        env: Rc<dyn ChannelEnvironment>,
        clock: Rc<dyn Clock>,
        local_peer: impl Into<String>,
        channels: Vec<BroadcastChannel>,
        quiet_period: MonotonicSeconds,
        max_time: MonotonicSeconds,
    ) -> Self {
        SyncEngine {
            inner: Rc::new(Inner {
                store,
                broker,
                env,
                clock,
                local_peer: local_peer.into(),
                channels,
                quiet_period,
                max_time,
                debounce_window: 1.0,
                debounce: DebounceBucket::new(),
                peers: RefCell::new(HashMap::new()),
                discovery: RefCell::new(DiscoveryState::default()),
                on_discovery_complete: RefCell::new(None),
            }),
        }
    }

    pub fn set_on_discovery_complete(&self, callback: impl FnMut(bool) + 'static) {
        *self.inner.on_discovery_complete.borrow_mut() = Some(Box::new(callback));
    }

    pub fn discovered_peers(&self) -> Vec<(String, PeerInfo)> {
        self.inner.peers.borrow().iter().map(|(id, info)| (id.clone(), *info)).collect()
    }

    fn send_unicast(&self, target: &str, envelope: &Envelope, priority: Priority) -> Result<()> {
        let bytes = encode_envelope(envelope)?;
        self.inner.broker.send_unicast(target, &bytes, priority);
        Ok(())
    }

    fn broadcast(&self, envelope: &Envelope, priority: Priority) -> Result<()> {
        let bytes = encode_envelope(envelope)?;
        broadcast_on_available_channels(
            self.inner.broker.as_ref(),
            self.inner.env.as_ref(),
            &self.inner.channels,
            &bytes,
            priority,
        );
        Ok(())
    }

    fn envelope(&self, message_type: MessageType, data: EnvelopeValue) -> Envelope {
        Envelope {
            message_type,
            peer_id: self.inner.local_peer.clone(),
            data,
        }
    }

    /// Start a discovery cycle: broadcast `PeerDiscoveryRequest` and
    /// arm the completion predicate.
    pub fn discover_peers(&self) -> Result<()> {
        let now = self.inner.clock.now();
        {
            let mut discovery = self.inner.discovery.borrow_mut();
            discovery.start_time = Some(now);
            discovery.last_response_time = Some(now);
            discovery.fired_this_cycle = false;
        }
        let envelope = self.envelope(MessageType::PeerDiscoveryRequest, EnvelopeValue::Empty);
        self.broadcast(&envelope, Priority::Low)
    }

    /// Request a snapshot from `target`, or — if `None` — from every
    /// directory peer that's new or known to be ahead of us.
    pub fn request_snapshot(&self, target: Option<&str>) -> Result<()> {
        let envelope = self.envelope(MessageType::SnapshotRequest, EnvelopeValue::Empty);
        match target {
            Some(peer) => self.send_unicast(peer, &envelope, Priority::Low),
            None => {
                let local_clock = self.inner.store.clock();
                let targets: Vec<String> = {
                    let mut peers = self.inner.peers.borrow_mut();
                    let mut targets = Vec::new();
                    for (peer_id, info) in peers.iter_mut() {
                        if info.is_new {
                            info.is_new = false;
                            targets.push(peer_id.clone());
                        } else if info.last_known_clock > local_clock {
                            targets.push(peer_id.clone());
                        }
                    }
                    targets
                };
                for peer in targets {
                    self.send_unicast(&peer, &envelope, Priority::Low)?;
                }
                Ok(())
            }
        }
    }

    /// Broadcast a fresh digest of every row this store knows about.
    pub fn sync_now(&self) -> Result<()> {
        let digest = build_digest(&self.inner.store)?;
        let envelope = self.envelope(MessageType::Digest, EnvelopeValue::Digest(digest));
        self.broadcast(&envelope, Priority::Normal)
    }

    /// Evaluate the discovery completion predicate. Call this on every
    /// tick of the host's update loop.
    pub fn tick(&self) {
        let now = self.inner.clock.now();
        let should_fire = {
            let discovery = self.inner.discovery.borrow();
            match (discovery.start_time, discovery.last_response_time) {
                (Some(start), Some(last_response)) if !discovery.fired_this_cycle => {
                    now - last_response >= self.inner.quiet_period || now - start >= self.inner.max_time
                }
                _ => false,
            }
        };
        if !should_fire {
            return;
        }
        let is_initial = {
            let mut discovery = self.inner.discovery.borrow_mut();
            discovery.fired_this_cycle = true;
            let is_initial = !discovery.ever_completed;
            discovery.ever_completed = true;
            is_initial
        };
        if let Some(callback) = self.inner.on_discovery_complete.borrow_mut().as_mut() {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(is_initial))) {
                tracing::warn!(?payload, "onDiscoveryComplete callback panicked; continuing");
            }
        }
    }

    /// Decode and route one inbound envelope. Debounced by
    /// `(messageType, peerId)`: only the first message per bucket per
    /// `debounce_window` actually dispatches.
    pub fn ingest(&self, bytes: &[u8]) -> Result<()> {
        let envelope = match decode_envelope(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%err, "dropping malformed envelope");
                return Ok(());
            }
        };
        if envelope.peer_id == self.inner.local_peer {
            tracing::warn!(peer = %envelope.peer_id, "dropping envelope from self");
            return Ok(());
        }

        let engine = self.clone();
        let accepted = self.inner.debounce.offer(
            self.inner.clock.as_ref(),
            self.inner.debounce_window,
            envelope,
            move |envelope| engine.dispatch(envelope),
        );
        if !accepted {
            tracing::debug!("coalesced duplicate message within debounce window");
        }
        Ok(())
    }

    fn dispatch(&self, envelope: Envelope) {
        let message_type = envelope.message_type;
        let result = match message_type {
            MessageType::PeerDiscoveryRequest => self.handle_discovery_request(&envelope),
            MessageType::PeerDiscoveryResponse => self.handle_discovery_response(&envelope),
            MessageType::SnapshotRequest => self.handle_snapshot_request(&envelope),
            MessageType::SnapshotResponse => self.handle_snapshot_response(&envelope),
            MessageType::Digest => self.handle_digest(&envelope),
            MessageType::RequestRows => self.handle_request_rows(&envelope),
            MessageType::Rows => self.handle_rows(&envelope),
        };
        if let Err(err) = result {
            tracing::warn!(%err, ?message_type, "dropping envelope after handler error");
        }
    }

    fn handle_discovery_request(&self, envelope: &Envelope) -> Result<()> {
        let response = self.envelope(MessageType::PeerDiscoveryResponse, EnvelopeValue::Clock(self.inner.store.clock()));
        self.send_unicast(&envelope.peer_id, &response, Priority::Low)
    }

    fn handle_discovery_response(&self, envelope: &Envelope) -> Result<()> {
        let EnvelopeValue::Clock(peer_clock) = envelope.data else {
            tracing::warn!("PeerDiscoveryResponse without a clock payload");
            return Ok(());
        };
        {
            let mut peers = self.inner.peers.borrow_mut();
            peers
                .entry(envelope.peer_id.clone())
                .and_modify(|info| info.last_known_clock = peer_clock)
                .or_insert(PeerInfo { last_known_clock: peer_clock, is_new: true });
        }
        self.inner.discovery.borrow_mut().last_response_time = Some(self.inner.clock.now());
        Ok(())
    }

    fn handle_snapshot_request(&self, envelope: &Envelope) -> Result<()> {
        let snapshot = build_snapshot(&self.inner.store)?;
        let response = self.envelope(MessageType::SnapshotResponse, EnvelopeValue::Snapshot(snapshot));
        self.send_unicast(&envelope.peer_id, &response, Priority::Low)
    }

    fn handle_snapshot_response(&self, envelope: &Envelope) -> Result<()> {
        let EnvelopeValue::Snapshot(payload) = &envelope.data else {
            tracing::warn!("SnapshotResponse without a snapshot payload");
            return Ok(());
        };
        self.merge_rows_payload(payload, MergeContext { suppress_fanout: true });
        Ok(())
    }

    fn handle_digest(&self, envelope: &Envelope) -> Result<()> {
        let EnvelopeValue::Digest(digest) = &envelope.data else {
            tracing::warn!("Digest message without a digest payload");
            return Ok(());
        };
        let missing = compute_missing(&self.inner.store, digest)?;
        if missing.tables.is_empty() {
            return Ok(());
        }
        let request = self.envelope(MessageType::RequestRows, EnvelopeValue::RequestRows(missing));
        self.send_unicast(&envelope.peer_id, &request, Priority::Normal)
    }

    fn handle_request_rows(&self, envelope: &Envelope) -> Result<()> {
        let EnvelopeValue::RequestRows(request) = &envelope.data else {
            tracing::warn!("RequestRows message without a request payload");
            return Ok(());
        };
        let response_payload = build_rows_response(&self.inner.store, request)?;
        let response = self.envelope(MessageType::Rows, EnvelopeValue::Rows(response_payload));
        self.send_unicast(&envelope.peer_id, &response, Priority::Normal)
    }

    fn handle_rows(&self, envelope: &Envelope) -> Result<()> {
        let EnvelopeValue::Rows(payload) = &envelope.data else {
            tracing::warn!("Rows message without a rows payload");
            return Ok(());
        };
        self.merge_rows_payload(payload, MergeContext::default());
        Ok(())
    }

    fn merge_rows_payload(&self, payload: &crate::messages::RowsPayload, ctx: MergeContext) {
        for (table, rows) in &payload.tables {
            for (key, row) in rows {
                match self.inner.store.merge_row(table, key.clone(), row.clone(), &ctx) {
                    Ok(Some(warning)) => tracing::warn!(?warning, table, "row rejected during merge"),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(%err, table, "merge_row failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ChannelBroker, ChannelEnvironment};
    use crate::debounce::TimerHandle;
    use gossipkv_core::{Key, KeyType, RowData, Value};
    use std::cell::Cell;

    struct ImmediateClock {
        now: Cell<MonotonicSeconds>,
    }

    impl Clock for ImmediateClock {
        fn now(&self) -> MonotonicSeconds {
            self.now.get()
        }

        fn schedule_once(&self, _delay: MonotonicSeconds, callback: Box<dyn FnOnce()>) -> TimerHandle {
            callback();
            TimerHandle(0)
        }
    }

    struct AlwaysShoutEnv;
    impl ChannelEnvironment for AlwaysShoutEnv {
        fn in_guild(&self) -> bool {
            false
        }
        fn in_raid(&self) -> bool {
            false
        }
        fn in_group(&self) -> bool {
            false
        }
        fn in_instance(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        unicasts: RefCell<Vec<(String, Vec<u8>)>>,
        broadcasts: RefCell<Vec<Vec<u8>>>,
    }

    impl ChannelBroker for RecordingBroker {
        fn send_unicast(&self, target: &str, bytes: &[u8], _priority: Priority) {
            self.unicasts.borrow_mut().push((target.to_string(), bytes.to_vec()));
        }
        fn send_broadcast(&self, _channel: BroadcastChannel, bytes: &[u8], _priority: Priority) {
            self.broadcasts.borrow_mut().push(bytes.to_vec());
        }
    }

    fn engine_with(peer: &str, broker: Rc<RecordingBroker>) -> SyncEngine {
        let store = Rc::new(VersionedStore::new(peer));
        store.new_table("Users", KeyType::String, None, None, None).unwrap();
        SyncEngine::new(
            store,
            broker,
            Rc::new(AlwaysShoutEnv),
            Rc::new(ImmediateClock { now: Cell::new(0.0) }),
            peer,
            vec![BroadcastChannel::Shout],
            1.0,
            3.0,
        )
    }

    #[test]
    fn discovery_request_reaches_shout_and_is_answered_with_local_clock() {
        let broker_a = Rc::new(RecordingBroker::default());
        let engine_a = engine_with("a", Rc::clone(&broker_a));
        engine_a.discover_peers().unwrap();
        assert_eq!(broker_a.broadcasts.borrow().len(), 1);

        let broker_b = Rc::new(RecordingBroker::default());
        let engine_b = engine_with("b", Rc::clone(&broker_b));
        let bytes = broker_a.broadcasts.borrow()[0].clone();
        engine_b.ingest(&bytes).unwrap();

        let unicasts = broker_b.unicasts.borrow();
        assert_eq!(unicasts.len(), 1);
        assert_eq!(unicasts[0].0, "a");
        let reply = decode_envelope(&unicasts[0].1).unwrap();
        assert_eq!(reply.message_type, MessageType::PeerDiscoveryResponse);
    }

    #[test]
    fn digest_triggers_request_rows_only_for_missing_keys() {
        let broker_a = Rc::new(RecordingBroker::default());
        let engine_a = engine_with("a", Rc::clone(&broker_a));
        let mut data = RowData::new();
        data.insert("name".into(), Value::Str("Alice".into()));
        engine_a.inner.store.set("Users", Key::Str("1".into()), data).unwrap();

        let broker_b = Rc::new(RecordingBroker::default());
        let engine_b = engine_with("b", Rc::clone(&broker_b));

        engine_a.sync_now().unwrap();
        let digest_bytes = broker_a.broadcasts.borrow()[0].clone();
        engine_b.ingest(&digest_bytes).unwrap();

        let unicasts = broker_b.unicasts.borrow();
        assert_eq!(unicasts.len(), 1);
        let request = decode_envelope(&unicasts[0].1).unwrap();
        assert_eq!(request.message_type, MessageType::RequestRows);
    }

    #[test]
    fn rows_message_merges_into_the_local_store() {
        let broker_a = Rc::new(RecordingBroker::default());
        let engine_a = engine_with("a", Rc::clone(&broker_a));
        let mut data = RowData::new();
        data.insert("name".into(), Value::Str("Alice".into()));
        engine_a.inner.store.set("Users", Key::Str("1".into()), data).unwrap();

        let broker_b = Rc::new(RecordingBroker::default());
        let engine_b = engine_with("b", Rc::clone(&broker_b));

        engine_a.sync_now().unwrap();
        engine_b.ingest(&broker_a.broadcasts.borrow()[0].clone()).unwrap();
        engine_a.ingest(&broker_b.unicasts.borrow()[0].1.clone()).unwrap();
        engine_b.ingest(&broker_a.unicasts.borrow()[0].1.clone()).unwrap();

        assert!(engine_b.inner.store.has_key("Users", &Key::Str("1".into())).unwrap());
    }

    #[test]
    fn duplicate_broadcasts_within_the_debounce_window_dispatch_once() {
        let broker_a = Rc::new(RecordingBroker::default());
        let engine_a = engine_with("a", Rc::clone(&broker_a));
        engine_a.discover_peers().unwrap();
        let bytes = broker_a.broadcasts.borrow()[0].clone();

        let broker_b = Rc::new(RecordingBroker::default());
        let engine_b = engine_with("b", Rc::clone(&broker_b));
        engine_b.ingest(&bytes).unwrap();
        engine_b.ingest(&bytes).unwrap();
        engine_b.ingest(&bytes).unwrap();

        assert_eq!(broker_b.unicasts.borrow().len(), 1);
    }

    #[test]
    fn tick_fires_discovery_complete_once_quiet_period_elapses() {
        let broker = Rc::new(RecordingBroker::default());
        let store = Rc::new(VersionedStore::new("a"));
        let clock = Rc::new(ImmediateClock { now: Cell::new(0.0) });
        let engine = SyncEngine::new(
            store,
            broker as Rc<dyn ChannelBroker>,
            Rc::new(AlwaysShoutEnv),
            Rc::clone(&clock),
            "a",
            vec![BroadcastChannel::Shout],
            1.0,
            3.0,
        );
        let fired = Rc::new(RefCell::new(Vec::new()));
        let fired_clone = Rc::clone(&fired);
        engine.set_on_discovery_complete(move |is_initial| fired_clone.borrow_mut().push(is_initial));

        engine.discover_peers().unwrap();
        engine.tick();
        assert!(fired.borrow().is_empty(), "quiet period hasn't elapsed yet");

        clock.now.set(1.5);
        engine.tick();
        assert_eq!(fired.borrow().as_slice(), [true]);

        engine.tick();
        assert_eq!(fired.borrow().as_slice(), [true], "must not refire within the same cycle");
    }
}
