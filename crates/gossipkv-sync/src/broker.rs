//! The channel broker: the consumed transport seam.
//!
//! Synchronous by design (no suspension points inside any API call) —
//! a best-effort, possibly-lossy, possibly-duplicating delivery
//! mechanism the engine treats as an opaque collaborator.

use crate::messages::{BroadcastChannel, Priority};

/// Best-effort message delivery, implemented by the host. The broker
/// may lose, duplicate, reorder across channels, or fragment messages
/// transparently; the engine only assumes the envelope is intact if
/// delivered at all.
pub trait ChannelBroker {
    /// Send `bytes` to a single named peer ("whisper").
    fn send_unicast(&self, target: &str, bytes: &[u8], priority: Priority);

    /// Send `bytes` to every peer listening on `channel`.
    fn send_broadcast(&self, channel: BroadcastChannel, bytes: &[u8], priority: Priority);
}

/// Gates which broadcast channels are usable right now: for each
/// configured channel, emit only if the local peer is in a matching
/// group.
pub trait ChannelEnvironment {
    fn in_guild(&self) -> bool;
    fn in_raid(&self) -> bool;
    fn in_group(&self) -> bool;
    fn in_instance(&self) -> bool;
}

/// A channel is available iff its matching environment predicate holds:
/// `GUILD` iff in a guild, `RAID` iff in a raid, `PARTY` iff in a group,
/// `SHOUT` iff *not* in an instance.
pub fn channel_available(channel: BroadcastChannel, env: &impl ChannelEnvironment) -> bool {
    match channel {
        BroadcastChannel::Guild => env.in_guild(),
        BroadcastChannel::Raid => env.in_raid(),
        BroadcastChannel::Party => env.in_group(),
        BroadcastChannel::Shout => !env.in_instance(),
    }
}

/// Broadcast on every channel configured for the database that is
/// currently available, per [`channel_available`]. `channels` is the
/// database's configured channel list.
pub fn broadcast_on_available_channels(
    broker: &impl ChannelBroker,
    env: &impl ChannelEnvironment,
    channels: &[BroadcastChannel],
    bytes: &[u8],
    priority: Priority,
) {
    for &channel in channels {
        if channel_available(channel, env) {
            broker.send_broadcast(channel, bytes, priority);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeEnv {
        guild: bool,
        raid: bool,
        group: bool,
        instance: bool,
    }

    impl ChannelEnvironment for FakeEnv {
        fn in_guild(&self) -> bool {
            self.guild
        }
        fn in_raid(&self) -> bool {
            self.raid
        }
        fn in_group(&self) -> bool {
            self.group
        }
        fn in_instance(&self) -> bool {
            self.instance
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        broadcasts: RefCell<Vec<BroadcastChannel>>,
    }

    impl ChannelBroker for RecordingBroker {
        fn send_unicast(&self, _target: &str, _bytes: &[u8], _priority: Priority) {}
        fn send_broadcast(&self, channel: BroadcastChannel, _bytes: &[u8], _priority: Priority) {
            self.broadcasts.borrow_mut().push(channel);
        }
    }

    #[test]
    fn shout_is_available_only_outside_an_instance() {
        let env = FakeEnv { guild: false, raid: false, group: false, instance: true };
        assert!(!channel_available(BroadcastChannel::Shout, &env));
        let env = FakeEnv { guild: false, raid: false, group: false, instance: false };
        assert!(channel_available(BroadcastChannel::Shout, &env));
    }

    #[test]
    fn broadcasts_only_on_available_channels() {
        let env = FakeEnv { guild: true, raid: false, group: true, instance: true };
        let broker = RecordingBroker::default();
        let channels = [
            BroadcastChannel::Guild,
            BroadcastChannel::Raid,
            BroadcastChannel::Party,
            BroadcastChannel::Shout,
        ];
        broadcast_on_available_channels(&broker, &env, &channels, b"hi", Priority::Normal);
        assert_eq!(
            broker.broadcasts.into_inner(),
            vec![BroadcastChannel::Guild, BroadcastChannel::Party]
        );
    }
}
