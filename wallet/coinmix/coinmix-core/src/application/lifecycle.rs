use crate::domain::session::{SessionRole, SessionState};
use crate::foundation::{SessionId, TxId};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

/// Hooks into the mixing session lifecycle. Every method defaults to a no-op.
pub trait SessionObserver: Send + Sync {
    fn on_state_changed(&self, _session_id: SessionId, _role: SessionRole, _from: SessionState, _to: SessionState) {}
    fn on_entry_accepted(&self, _session_id: SessionId, _entries_count: usize) {}
    fn on_collateral_forfeited(&self, _session_id: SessionId, _collateral: &TxId, _admitted: bool) {}
    fn on_completed(&self, _session_id: SessionId, _success: bool, _message: &str) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }
}

impl SessionObserver for CompositeObserver {
    fn on_state_changed(&self, session_id: SessionId, role: SessionRole, from: SessionState, to: SessionState) {
        info!("session state transition session_id={} role={:?} from={:?} to={:?}", session_id, role, from, to);
        for observer in &self.observers {
            observer.on_state_changed(session_id, role, from, to);
        }
    }

    fn on_entry_accepted(&self, session_id: SessionId, entries_count: usize) {
        debug!("entry accepted session_id={} entries_count={}", session_id, entries_count);
        for observer in &self.observers {
            observer.on_entry_accepted(session_id, entries_count);
        }
    }

    fn on_collateral_forfeited(&self, session_id: SessionId, collateral: &TxId, admitted: bool) {
        warn!("collateral forfeited session_id={} collateral_txid={} admitted={}", session_id, collateral, admitted);
        for observer in &self.observers {
            observer.on_collateral_forfeited(session_id, collateral, admitted);
        }
    }

    fn on_completed(&self, session_id: SessionId, success: bool, message: &str) {
        info!("session completed session_id={} success={} message={}", session_id, success, message);
        for observer in &self.observers {
            observer.on_completed(session_id, success, message);
        }
    }
}

/// Session event as captured by [`RecordingObserver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged { session_id: SessionId, from: SessionState, to: SessionState },
    EntryAccepted { session_id: SessionId, entries_count: usize },
    CollateralForfeited { session_id: SessionId, collateral: TxId, admitted: bool },
    Completed { session_id: SessionId, success: bool },
}

/// Keeps every callback in order; used by tests and diagnostics.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    fn push(&self, event: SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_changed(&self, session_id: SessionId, _role: SessionRole, from: SessionState, to: SessionState) {
        self.push(SessionEvent::StateChanged { session_id, from, to });
    }

    fn on_entry_accepted(&self, session_id: SessionId, entries_count: usize) {
        self.push(SessionEvent::EntryAccepted { session_id, entries_count });
    }

    fn on_collateral_forfeited(&self, session_id: SessionId, collateral: &TxId, admitted: bool) {
        self.push(SessionEvent::CollateralForfeited { session_id, collateral: *collateral, admitted });
    }

    fn on_completed(&self, session_id: SessionId, success: bool, _message: &str) {
        self.push(SessionEvent::Completed { session_id, success });
    }
}
