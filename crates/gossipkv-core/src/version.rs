//! Row versions and the last-writer-wins merge predicate.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::Key;

/// The peer-shorthand literal: "this row's `peer` equals its key."
pub const PEER_SELF_SHORTHAND: &str = "=";

/// A row's version: a Lamport clock, the writing peer, and an optional
/// tombstone marker.
///
/// `peer` is stored post-shorthand-resolution: if the literal peer ID
/// equals the string form of the row's key (and the table is
/// string-keyed), `peer` is the literal `"="` rather than a duplicate
/// copy of the key. Use [`Version::writer_peer`] to get the original
/// peer ID back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub clock: u64,
    pub peer: String,
    pub tombstone: bool,
}

impl Version {
    /// Build a version for a local write, resolving the `"="` shorthand
    /// when `peer` textually equals `key` and the key is string-typed.
    pub fn new_local(clock: u64, peer: &str, key: &Key, tombstone: bool) -> Result<Self> {
        if peer.is_empty() {
            return Err(CoreError::EmptyPeer);
        }
        if peer == PEER_SELF_SHORTHAND {
            return Err(CoreError::ReservedPeerLiteral);
        }
        let stored_peer = if matches!(key, Key::Str(s) if s == peer) {
            PEER_SELF_SHORTHAND.to_string()
        } else {
            peer.to_string()
        };
        Ok(Version {
            clock,
            peer: stored_peer,
            tombstone,
        })
    }

    /// Build a version exactly as received over the wire or from the
    /// codec, without shorthand resolution (the sender already resolved
    /// it, or it's the literal `"="`).
    pub fn from_parts(clock: u64, peer: String, tombstone: bool) -> Result<Self> {
        if peer.is_empty() {
            return Err(CoreError::EmptyPeer);
        }
        Ok(Version { clock, peer, tombstone })
    }

    /// The original writer's peer ID, restoring the `"="` shorthand
    /// against `key` if needed.
    pub fn writer_peer<'a>(&'a self, key: &'a Key) -> std::borrow::Cow<'a, str> {
        if self.peer == PEER_SELF_SHORTHAND {
            std::borrow::Cow::Owned(key.to_string_repr())
        } else {
            std::borrow::Cow::Borrowed(&self.peer)
        }
    }

    /// Whether `self` (incoming) supersedes `existing` under the LWW
    /// predicate: greater clock wins outright; on a tie, the
    /// lexicographically greater peer wins. Peer comparison uses the
    /// *restored* peer so that two writers who both wrote under the `"="`
    /// shorthand compare correctly against a third peer's literal ID.
    pub fn dominates(&self, existing: Option<&Version>, key: &Key) -> bool {
        let Some(existing) = existing else {
            return true;
        };
        match self.clock.cmp(&existing.clock) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                self.writer_peer(key).as_ref() > existing.writer_peer(key).as_ref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_self_shorthand_for_string_keys() {
        let key = Key::Str("p1".into());
        let v = Version::new_local(1, "p1", &key, false).unwrap();
        assert_eq!(v.peer, "=");
        assert_eq!(v.writer_peer(&key), "p1");
    }

    #[test]
    fn integer_keys_never_get_shorthand() {
        let key = Key::Integer(7);
        let v = Version::new_local(1, "p1", &key, false).unwrap();
        assert_eq!(v.peer, "p1");
    }

    #[test]
    fn rejects_reserved_peer_literal() {
        let key = Key::Str("x".into());
        assert_eq!(
            Version::new_local(1, "=", &key, false).unwrap_err(),
            CoreError::ReservedPeerLiteral
        );
    }

    #[test]
    fn higher_clock_wins() {
        let key = Key::Integer(1);
        let a = Version::from_parts(1, "a".into(), false).unwrap();
        let b = Version::from_parts(2, "a".into(), false).unwrap();
        assert!(b.dominates(Some(&a), &key));
        assert!(!a.dominates(Some(&b), &key));
    }

    #[test]
    fn tie_breaks_on_peer_lexicographic_order() {
        let key = Key::Integer(1);
        let a = Version::from_parts(5, "alice".into(), false).unwrap();
        let b = Version::from_parts(5, "bob".into(), false).unwrap();
        assert!(b.dominates(Some(&a), &key));
        assert!(!a.dominates(Some(&b), &key));
    }

    #[test]
    fn anything_dominates_absent_existing() {
        let key = Key::Integer(1);
        let a = Version::from_parts(0, "a".into(), false).unwrap();
        assert!(a.dominates(None, &key));
    }

    #[test]
    fn tombstone_does_not_change_merge_precedence() {
        let key = Key::Integer(1);
        let live = Version::from_parts(1, "a".into(), false).unwrap();
        let tombstone = Version::from_parts(2, "a".into(), true).unwrap();
        assert!(tombstone.dominates(Some(&live), &key));
    }
}
