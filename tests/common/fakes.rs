use std::cell::RefCell;
use std::rc::Rc;

use dom_recorder::recorder::collaborators::{Broadcaster, SessionStore};
use dom_recorder::recorder::error::StoreError;
use dom_recorder::recorder::state::RecordingSession;

/// Broadcaster that keeps every message for later inspection.
#[derive(Clone, Default)]
pub struct RecordingBroadcaster {
    pub messages: Rc<RefCell<Vec<(String, serde_json::Value)>>>,
}

impl RecordingBroadcaster {
    pub fn topics(&self) -> Vec<String> {
        self.messages.borrow().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, topic: &str, payload: serde_json::Value) {
        self.messages.borrow_mut().push((topic.to_string(), payload));
    }
}

/// Store that keeps snapshots in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub saved: Rc<RefCell<Vec<RecordingSession>>>,
}

impl SessionStore for MemoryStore {
    fn save(&self, session: &RecordingSession) -> Result<(), StoreError> {
        self.saved.borrow_mut().push(session.clone());
        Ok(())
    }
}

/// Store that always fails.
pub struct BrokenStore;

impl SessionStore for BrokenStore {
    fn save(&self, _session: &RecordingSession) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}
