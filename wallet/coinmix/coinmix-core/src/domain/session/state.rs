use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    AcceptingEntries,
    Queue,
    FinalizeTransaction,
    Signing,
    Transmission,
    Success,
    Error,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Success | SessionState::Error)
    }

    /// States in which participants may still join or submit entries.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::AcceptingEntries | SessionState::Queue)
    }

    /// Returning to `AcceptingEntries` is always a reset and always allowed.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        if *self == next || next == SessionState::AcceptingEntries {
            return true;
        }
        matches!(
            (self, next),
            (SessionState::AcceptingEntries, SessionState::Queue)
                | (SessionState::AcceptingEntries, SessionState::FinalizeTransaction)
                | (SessionState::AcceptingEntries, SessionState::Error)
                | (SessionState::Queue, SessionState::Error)
                | (SessionState::FinalizeTransaction, SessionState::Signing)
                | (SessionState::FinalizeTransaction, SessionState::Error)
                | (SessionState::Signing, SessionState::Transmission)
                | (SessionState::Signing, SessionState::Success)
                | (SessionState::Signing, SessionState::Error)
                | (SessionState::Transmission, SessionState::Success)
                | (SessionState::Transmission, SessionState::Error)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionRole {
    Coordinator,
    Participant,
}

/// Outcome flag carried by status updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryAcceptance {
    Rejected,
    Accepted,
    /// Pure state broadcast, no verdict on a submission.
    Informational,
}
