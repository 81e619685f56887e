//! Process identity: the host-supplied player name and peer ID.
//!
//! An external collaborator trait rather than a value this crate can
//! compute itself.

use crate::error::{DatabaseError, Result};

/// Host-supplied identity for this process. `peer_id()` must be stable
/// for the session; a peer ID of the literal `"="` is disallowed — it
/// collides with the storage shorthand.
pub trait ProcessIdentity {
    fn player_name(&self) -> String;
    fn peer_id(&self) -> String;
}

pub(crate) fn validated_peer_id(identity: &dyn ProcessIdentity) -> Result<String> {
    let peer_id = identity.peer_id();
    if peer_id == gossipkv_core::PEER_SELF_SHORTHAND {
        return Err(DatabaseError::ReservedPeerId);
    }
    Ok(peer_id)
}
