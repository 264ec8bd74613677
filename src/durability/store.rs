use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use uuid::Uuid;

use super::StoreError;
use crate::envelope::Envelope;
use crate::transport::DeadLetter;

/// Durable storage for scheduled and dead-lettered envelopes.
pub trait EnvelopeStore: Send + Sync {
    /// Store an envelope for delivery no earlier than `not_before`.
    ///
    /// Scheduling an id that is already stored replaces it.
    fn schedule_envelope(&self, envelope: Envelope, not_before: SystemTime)
        -> Result<(), StoreError>;

    /// Every stored envelope due at `now`, earliest first. Does not remove them.
    fn fetch_due(&self, now: SystemTime) -> Result<Vec<Envelope>, StoreError>;

    /// Forget a scheduled envelope, but only the generation that was
    /// fetched: an entry rescheduled since then has another
    /// `scheduled_time` and is kept. Unknown ids are ignored.
    fn remove_scheduled(
        &self,
        id: Uuid,
        scheduled_time: Option<SystemTime>,
    ) -> Result<(), StoreError>;

    fn move_to_dead_letter_storage(&self, envelope: Envelope, reason: &str)
        -> Result<(), StoreError>;
}

#[derive(Default)]
struct StoreState {
    scheduled: Vec<Envelope>,
    dead_letters: Vec<DeadLetter>,
}

/// In-memory [`EnvelopeStore`].
///
/// Cloning creates another handle to the same storage.
#[derive(Clone, Default)]
pub struct InMemoryEnvelopeStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryEnvelopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the scheduled envelopes.
    pub fn scheduled(&self) -> Vec<Envelope> {
        match self.state.read() {
            Ok(state) => state.scheduled.clone(),
            Err(poisoned) => poisoned.into_inner().scheduled.clone(),
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        match self.state.read() {
            Ok(state) => state.dead_letters.clone(),
            Err(poisoned) => poisoned.into_inner().dead_letters.clone(),
        }
    }
}

impl EnvelopeStore for InMemoryEnvelopeStore {
    fn schedule_envelope(
        &self,
        mut envelope: Envelope,
        not_before: SystemTime,
    ) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::LockPoisoned("schedule"))?;
        envelope.scheduled_time = Some(not_before);
        state.scheduled.retain(|e| e.id != envelope.id);
        state.scheduled.push(envelope);
        Ok(())
    }

    fn fetch_due(&self, now: SystemTime) -> Result<Vec<Envelope>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::LockPoisoned("fetch due"))?;
        let mut due: Vec<Envelope> = state
            .scheduled
            .iter()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.scheduled_time);
        Ok(due)
    }

    fn remove_scheduled(
        &self,
        id: Uuid,
        scheduled_time: Option<SystemTime>,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::LockPoisoned("remove scheduled"))?
            .scheduled
            .retain(|e| e.id != id || e.scheduled_time != scheduled_time);
        Ok(())
    }

    fn move_to_dead_letter_storage(
        &self,
        envelope: Envelope,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::LockPoisoned("dead letter"))?;
        state.scheduled.retain(|e| e.id != envelope.id);
        state.dead_letters.push(DeadLetter {
            envelope,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
