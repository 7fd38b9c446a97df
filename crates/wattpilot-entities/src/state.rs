//! Host-visible entity state storage
//!
//! Entities publish their coerced state here; the host (or a test) observes
//! changes through the state-changed broadcast. Timestamps follow the usual
//! convention: `last_changed` only moves when the value actually changed.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

/// The published state of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub unique_id: String,
    pub state: String,
    pub last_changed: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Notification fired whenever an entity state is written
#[derive(Debug, Clone)]
pub struct StateChanged {
    pub unique_id: String,
    pub old_state: Option<String>,
    pub new_state: String,
}

/// Stores the current host-visible state of every entity of one entry
pub struct EntityStateStore {
    states: DashMap<String, EntityState>,
    events: broadcast::Sender<StateChanged>,
}

impl EntityStateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            events,
        }
    }

    /// Write an entity state and fire a state-changed notification.
    ///
    /// `last_changed` is preserved when the value is unchanged.
    pub fn set(&self, unique_id: &str, state: impl Into<String>) -> EntityState {
        let state = state.into();
        let now = Utc::now();

        let old_state = self.states.get(unique_id).map(|s| s.state.clone());
        let last_changed = match self.states.get(unique_id) {
            Some(existing) if existing.state == state => existing.last_changed,
            _ => now,
        };

        let new_state = EntityState {
            unique_id: unique_id.to_string(),
            state: state.clone(),
            last_changed,
            last_updated: now,
        };
        self.states.insert(unique_id.to_string(), new_state.clone());

        debug!(
            unique_id,
            state = %new_state.state,
            changed = old_state.as_deref() != Some(new_state.state.as_str()),
            "entity state written"
        );

        let _ = self.events.send(StateChanged {
            unique_id: unique_id.to_string(),
            old_state,
            new_state: state,
        });

        new_state
    }

    /// Current state of an entity
    pub fn get(&self, unique_id: &str) -> Option<EntityState> {
        self.states.get(unique_id).map(|s| s.clone())
    }

    /// Current state value of an entity
    pub fn get_state(&self, unique_id: &str) -> Option<String> {
        self.states.get(unique_id).map(|s| s.state.clone())
    }

    /// Remove an entity's state at teardown
    pub fn remove(&self, unique_id: &str) -> Option<EntityState> {
        self.states.remove(unique_id).map(|(_, s)| s)
    }

    /// Drop every stored state
    pub fn clear(&self) {
        self.states.clear();
    }

    /// All stored states
    pub fn all(&self) -> Vec<EntityState> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Subscribe to state-changed notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.events.subscribe()
    }
}

impl Default for EntityStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_changed_preserved_for_same_value() {
        let store = EntityStateStore::new();
        let first = store.set("12345678_amp", "16");
        let second = store.set("12345678_amp", "16");

        assert_eq!(first.last_changed, second.last_changed);
        assert!(second.last_updated >= first.last_updated);
    }

    #[test]
    fn test_last_changed_moves_on_new_value() {
        let store = EntityStateStore::new();
        let first = store.set("12345678_amp", "16");
        let second = store.set("12345678_amp", "10");

        assert!(second.last_changed >= first.last_changed);
        assert_eq!(store.get_state("12345678_amp").as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_state_changed_notification() {
        let store = EntityStateStore::new();
        let mut rx = store.subscribe();
        store.set("12345678_car", "Charging");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.unique_id, "12345678_car");
        assert_eq!(event.old_state, None);
        assert_eq!(event.new_state, "Charging");
    }
}
