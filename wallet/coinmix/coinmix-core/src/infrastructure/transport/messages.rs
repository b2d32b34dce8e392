use crate::domain::payment::PaymentWinner;
use crate::domain::queue::MixingQueueAnnouncement;
use crate::domain::relay::{RelayAnnouncement, RelayPing};
use crate::domain::session::{EntryAcceptance, SessionState};
use crate::domain::transaction::{OutPoint, Transaction, TxIn, TxOut};
use crate::foundation::SessionId;
use serde::{Deserialize, Serialize};

/// Every message exchanged between mixing participants, coordinators and relay nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    QueueAnnouncement(MixingQueueAnnouncement),
    /// Participant asks to join a session for `amount`, bonding `collateral`.
    AmountHandshake { amount: u64, collateral: Transaction },
    EntrySubmission { inputs: Vec<TxIn>, amount: u64, collateral: Transaction, outputs: Vec<TxOut> },
    /// Participant's signed inputs for the current draft.
    SignatureSubmission { inputs: Vec<TxIn> },
    FinalizedDraft { session_id: SessionId, transaction: Transaction },
    CompletionNotice { session_id: SessionId, error: bool, message: String },
    StatusUpdate { session_id: SessionId, state: SessionState, entries_count: u32, accepted: EntryAcceptance, message: String },
    PaymentWinner(PaymentWinner),
    PaymentSyncRequest,
    RelayAnnouncement(RelayAnnouncement),
    RelayPing(RelayPing),
    /// `None` asks for the whole registry.
    RegistrySyncRequest { collateral: Option<OutPoint> },
}

impl ProtocolMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            ProtocolMessage::QueueAnnouncement(_) => "queue_announcement",
            ProtocolMessage::AmountHandshake { .. } => "amount_handshake",
            ProtocolMessage::EntrySubmission { .. } => "entry_submission",
            ProtocolMessage::SignatureSubmission { .. } => "signature_submission",
            ProtocolMessage::FinalizedDraft { .. } => "finalized_draft",
            ProtocolMessage::CompletionNotice { .. } => "completion_notice",
            ProtocolMessage::StatusUpdate { .. } => "status_update",
            ProtocolMessage::PaymentWinner(_) => "payment_winner",
            ProtocolMessage::PaymentSyncRequest => "payment_sync_request",
            ProtocolMessage::RelayAnnouncement(_) => "relay_announcement",
            ProtocolMessage::RelayPing(_) => "relay_ping",
            ProtocolMessage::RegistrySyncRequest { .. } => "registry_sync_request",
        }
    }
}
