//! The mixing session state machine.
//!
//! One [`MixingSession`] value runs either the coordinator or the participant side of the
//! protocol. Both sides share the state enum, the entry list, the locked coin set and the
//! timeout policy; role-specific data lives in [`Role`] and every role-dependent branch goes
//! through [`MixingSession::role`].

mod coordinator;
mod participant;
mod timeout;

use crate::application::lifecycle::{NoopObserver, SessionObserver};
use crate::application::queue::MixingQueueBroadcaster;
use crate::application::registry::RelayNodeRegistry;
use crate::domain::denomination::DenominationMask;
use crate::domain::session::{EntryAcceptance, ParticipantEntry, SessionRole, SessionState};
use crate::domain::transaction::{OutPoint, Transaction};
use crate::foundation::util::time::Clock;
use crate::foundation::{
    MixError, SessionId, SigningKeypair, TimestampMs, COMPLETION_GRACE_MS, DEFAULT_PARTICIPANT_CAP, ENTRY_TTL_MS, SESSION_ID_MAX,
    TERMINAL_DISPLAY_MS,
};
use crate::infrastructure::chain::ChainIndex;
use crate::infrastructure::config::MixingConfig;
use crate::infrastructure::mempool::Mempool;
use crate::infrastructure::transport::{ProtocolMessage, Transport};
use crate::infrastructure::wallet::Wallet;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub use participant::CoordinatorPeer;

/// Collaborators shared by every session on a node.
#[derive(Clone)]
pub struct SessionContext {
    pub chain: Arc<dyn ChainIndex>,
    pub mempool: Arc<dyn Mempool>,
    pub wallet: Arc<dyn Wallet>,
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<RelayNodeRegistry>,
    pub queue: Arc<MixingQueueBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub observer: Arc<dyn SessionObserver>,
}

impl SessionContext {
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn noop_observer() -> Arc<dyn SessionObserver> {
        Arc::new(NoopObserver)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub participant_cap: usize,
    pub entry_ttl_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { participant_cap: DEFAULT_PARTICIPANT_CAP, entry_ttl_ms: ENTRY_TTL_MS }
    }
}

impl From<&MixingConfig> for SessionConfig {
    fn from(config: &MixingConfig) -> Self {
        Self { participant_cap: config.participant_cap, entry_ttl_ms: config.entry_ttl_ms() }
    }
}

pub(crate) struct CoordinatorRole {
    identity: OutPoint,
    messaging: SigningKeypair,
    /// Collateral of every participant that passed the amount handshake.
    session_collaterals: Vec<Transaction>,
    rng: StdRng,
}

#[derive(Default)]
pub(crate) struct ParticipantRole {
    coordinator: Option<CoordinatorPeer>,
    /// Set once the coordinator accepted our handshake and assigned a session id.
    found_coordinator: bool,
    collateral: Option<Transaction>,
    completed: bool,
    /// The coordinator refused us before a session existed; try another one.
    needs_retry: bool,
    last_success_block: Option<u64>,
}

pub(crate) enum Role {
    Coordinator(CoordinatorRole),
    Participant(ParticipantRole),
}

pub struct MixingSession {
    ctx: SessionContext,
    config: SessionConfig,
    state: SessionState,
    session_id: SessionId,
    session_amount: u64,
    session_denom: DenominationMask,
    /// Reservations made through the amount handshake.
    participant_count: usize,
    /// Coordinator: every accepted entry. Participant: its own entries.
    entries: Vec<ParticipantEntry>,
    final_tx: Option<Transaction>,
    last_state_change: TimestampMs,
    last_message: String,
    locked_coins: Vec<OutPoint>,
    role: Role,
}

impl MixingSession {
    /// Coordinator side, run by a relay node identified by `identity` and signing queue
    /// announcements with `messaging`.
    pub fn coordinator(ctx: SessionContext, config: SessionConfig, identity: OutPoint, messaging: SigningKeypair) -> Self {
        Self::coordinator_with_rng(ctx, config, identity, messaging, StdRng::from_entropy())
    }

    pub fn coordinator_with_rng(ctx: SessionContext, config: SessionConfig, identity: OutPoint, messaging: SigningKeypair, rng: StdRng) -> Self {
        let role = Role::Coordinator(CoordinatorRole { identity, messaging, session_collaterals: Vec::new(), rng });
        let mut session = Self::with_role(ctx, config, role);
        session.session_id = session.next_session_id();
        session
    }

    pub fn participant(ctx: SessionContext, config: SessionConfig) -> Self {
        Self::with_role(ctx, config, Role::Participant(ParticipantRole::default()))
    }

    fn with_role(ctx: SessionContext, config: SessionConfig, role: Role) -> Self {
        let now = ctx.clock.now_millis();
        Self {
            ctx,
            config,
            state: SessionState::AcceptingEntries,
            session_id: 0,
            session_amount: 0,
            session_denom: 0,
            participant_count: 0,
            entries: Vec::new(),
            final_tx: None,
            last_state_change: now,
            last_message: String::new(),
            locked_coins: Vec::new(),
            role,
        }
    }

    pub fn role(&self) -> SessionRole {
        match self.role {
            Role::Coordinator(_) => SessionRole::Coordinator,
            Role::Participant(_) => SessionRole::Participant,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.role() == SessionRole::Coordinator
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn session_amount(&self) -> u64 {
        self.session_amount
    }

    pub fn session_denomination(&self) -> DenominationMask {
        self.session_denom
    }

    pub fn participant_count(&self) -> usize {
        self.participant_count
    }

    pub fn entries(&self) -> &[ParticipantEntry] {
        &self.entries
    }

    pub fn entries_count(&self) -> usize {
        self.entries.len()
    }

    pub fn final_transaction(&self) -> Option<&Transaction> {
        self.final_tx.as_ref()
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn locked_coins(&self) -> &[OutPoint] {
        &self.locked_coins
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn now(&self) -> TimestampMs {
        self.ctx.clock.now_millis()
    }

    fn idle_millis(&self) -> u64 {
        self.now().saturating_sub(self.last_state_change)
    }

    fn next_session_id(&mut self) -> SessionId {
        match &mut self.role {
            Role::Coordinator(coordinator) => coordinator.rng.gen_range(1..=SESSION_ID_MAX),
            Role::Participant(_) => 0,
        }
    }

    /// Validated transition, stamping the change time and notifying observers.
    pub(crate) fn set_state(&mut self, next: SessionState) -> Result<(), MixError> {
        if !self.state.can_transition_to(next) {
            return Err(MixError::InvalidStateTransition { from: format!("{:?}", self.state), to: format!("{:?}", next) });
        }
        self.apply_state(next);
        Ok(())
    }

    /// Participants follow whatever state their coordinator reports.
    fn mirror_state(&mut self, next: SessionState) {
        self.apply_state(next);
    }

    fn apply_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        let from = self.state;
        self.state = next;
        self.last_state_change = self.now();
        debug!("session state set session_id={} role={:?} from={:?} to={:?}", self.session_id, self.role(), from, next);
        self.ctx.observer.on_state_changed(self.session_id, self.role(), from, next);
        if self.is_coordinator() {
            self.relay_status(EntryAcceptance::Informational, "");
        }
    }

    /// Release every coin this session locked.
    pub fn unlock_coins(&mut self) {
        for outpoint in self.locked_coins.drain(..) {
            if let Err(err) = self.ctx.wallet.unlock_coin(&outpoint) {
                warn!("failed to unlock coin outpoint={} error={}", outpoint, err);
            }
        }
    }

    fn lock_coin(&mut self, outpoint: OutPoint) -> Result<(), MixError> {
        self.ctx.wallet.lock_coin(&outpoint)?;
        if !self.locked_coins.contains(&outpoint) {
            self.locked_coins.push(outpoint);
        }
        Ok(())
    }

    /// Clear the session back to `AcceptingEntries`, releasing locked coins.
    ///
    /// With `full` the participant's own entries go too and the session gets a new id
    /// (a fresh random id for coordinators, zero for participants).
    pub fn reset(&mut self, full: bool) {
        let coordinator = self.is_coordinator();
        self.final_tx = None;
        if full || coordinator {
            self.entries.clear();
        }
        self.session_amount = 0;
        self.session_denom = 0;
        self.participant_count = 0;
        match &mut self.role {
            Role::Coordinator(role) => role.session_collaterals.clear(),
            Role::Participant(role) => {
                role.found_coordinator = false;
                role.collateral = None;
                role.completed = false;
                if full {
                    role.coordinator = None;
                }
            }
        }
        if full {
            self.session_id = self.next_session_id();
        }
        self.unlock_coins();
        self.apply_state(SessionState::AcceptingEntries);
        self.last_state_change = self.now();
        info!("session reset session_id={} role={:?} full={}", self.session_id, self.role(), full);
    }

    /// Advance the session by whatever its current state allows.
    pub fn check(&mut self) -> Result<(), MixError> {
        if self.is_coordinator() {
            self.advance_coordinator()?;
        } else if self.state == SessionState::Signing && self.participant_completed() && self.idle_millis() >= COMPLETION_GRACE_MS {
            debug!("completion grace elapsed session_id={}", self.session_id);
            self.reset(true);
        }

        if self.state.is_terminal() && self.idle_millis() >= TERMINAL_DISPLAY_MS {
            self.reset(true);
        }
        Ok(())
    }

    /// Dispatch a session message received from `from`. Protocol rejections are answered
    /// to the sender and do not surface as errors.
    pub fn handle_message(&mut self, from: &str, message: ProtocolMessage) -> Result<(), MixError> {
        trace!("session message from={} message_type={} role={:?}", from, message.message_type(), self.role());
        match (self.role(), message) {
            (_, ProtocolMessage::QueueAnnouncement(announcement)) => {
                let ready = announcement.ready;
                let relay = announcement.relay;
                match self.ctx.queue.receive(announcement) {
                    Ok(_) => {}
                    Err(err) => {
                        debug!("queue announcement ignored from={} error={}", from, err);
                        return Ok(());
                    }
                }
                if ready && !self.is_coordinator() {
                    self.on_coordinator_ready(&relay)?;
                }
                Ok(())
            }
            (SessionRole::Coordinator, ProtocolMessage::AmountHandshake { amount, collateral }) => {
                match self.accept_participant(amount, collateral) {
                    Ok(()) => self.reply_status(from, EntryAcceptance::Accepted, ""),
                    Err(err) if err.is_protocol_rejection() => self.reply_status(from, EntryAcceptance::Rejected, &err.to_string()),
                    Err(err) => Err(err),
                }
            }
            (SessionRole::Coordinator, ProtocolMessage::EntrySubmission { inputs, amount, collateral, outputs }) => {
                match self.add_entry(inputs, amount, collateral, outputs) {
                    Ok(()) => {
                        self.reply_status(from, EntryAcceptance::Accepted, "")?;
                        self.check()
                    }
                    Err(err) if err.is_protocol_rejection() => self.reply_status(from, EntryAcceptance::Rejected, &err.to_string()),
                    Err(err) => Err(err),
                }
            }
            (SessionRole::Coordinator, ProtocolMessage::SignatureSubmission { inputs }) => self.add_script_sig(inputs),
            (SessionRole::Participant, message) => {
                if !self.is_from_coordinator(from) {
                    debug!("session message not from our coordinator from={} message_type={}", from, message.message_type());
                    return Ok(());
                }
                match message {
                    ProtocolMessage::StatusUpdate { session_id, state, entries_count, accepted, message } => {
                        self.status_update(session_id, state, entries_count, accepted, &message)
                    }
                    ProtocolMessage::FinalizedDraft { session_id, transaction } => {
                        if session_id != self.session_id {
                            debug!("draft for another session session_id={} ours={}", session_id, self.session_id);
                            return Ok(());
                        }
                        self.sign_final_transaction(transaction).map(|_| ())
                    }
                    ProtocolMessage::CompletionNotice { session_id, error, message } => {
                        if session_id != self.session_id {
                            return Ok(());
                        }
                        self.completed_transaction(error, &message)
                    }
                    _ => Ok(()),
                }
            }
            (SessionRole::Coordinator, message) => {
                trace!("message ignored by coordinator session message_type={}", message.message_type());
                Ok(())
            }
        }
    }

    fn reply_status(&self, peer: &str, accepted: EntryAcceptance, message: &str) -> Result<(), MixError> {
        self.ctx.transport.send(peer, self.status_message(accepted, message))
    }

    fn status_message(&self, accepted: EntryAcceptance, message: &str) -> ProtocolMessage {
        ProtocolMessage::StatusUpdate {
            session_id: self.session_id,
            state: self.state,
            entries_count: self.entries.len() as u32,
            accepted,
            message: message.to_string(),
        }
    }

    /// Coordinator only: tell every peer where this session stands. Best effort.
    fn relay_status(&self, accepted: EntryAcceptance, message: &str) {
        if let Err(err) = self.ctx.transport.broadcast(self.status_message(accepted, message)) {
            warn!("status relay failed session_id={} error={}", self.session_id, err);
        }
    }
}
