//! Participant profiles under `users/{id}`.

use std::sync::Arc;

use tracing::info;

use engo_shared::{Participant, ParticipantId, ProfileRecord};
use engo_store::MessageStore;

use crate::error::ProfileError;
use crate::paths;

pub struct ProfileDirectory {
    store: Arc<dyn MessageStore>,
}

impl ProfileDirectory {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Create or replace the profile of `participant`. Called on sign-in.
    pub async fn upsert(&self, participant: &Participant) -> Result<(), ProfileError> {
        let path = paths::user(&participant.id)?;
        let record = ProfileRecord::from_participant(participant);
        self.store.write(&path, record.to_value()).await?;
        info!(user = %participant.id.short(), "profile saved");
        Ok(())
    }

    /// One-shot lookup, e.g. for a conversation header.
    pub async fn fetch(&self, id: &ParticipantId) -> Result<Option<Participant>, ProfileError> {
        let path = paths::user(id)?;
        match self.store.read(&path).await? {
            Some(value) => Ok(Some(ProfileRecord::decode(id.as_str(), &value)?)),
            None => Ok(None),
        }
    }
}
