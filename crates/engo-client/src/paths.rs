//! Store layout: `messages/{viewer}/{peer}/{key}` and `users/{id}`.

use engo_shared::constants::{MESSAGES_ROOT, USERS_ROOT};
use engo_shared::ParticipantId;
use engo_store::{Result, StorePath};

/// The copy of the conversation that `viewer` keeps with `peer`.
pub fn conversation(viewer: &ParticipantId, peer: &ParticipantId) -> Result<StorePath> {
    StorePath::parse(MESSAGES_ROOT)?
        .child(viewer.as_str())?
        .child(peer.as_str())
}

pub fn users() -> Result<StorePath> {
    StorePath::parse(USERS_ROOT)
}

pub fn user(id: &ParticipantId) -> Result<StorePath> {
    users()?.child(id.as_str())
}
