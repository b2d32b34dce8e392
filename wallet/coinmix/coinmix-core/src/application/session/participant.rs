use super::{MixingSession, ParticipantRole, Role};
use crate::domain::denomination::denominations_by_amount;
use crate::domain::session::{own_input_positions, verify_own_outputs, EntryAcceptance, EntryInput, ParticipantEntry, SessionState};
use crate::domain::transaction::{OutPoint, Transaction, TxOut};
use crate::foundation::{MixError, SessionId};
use crate::infrastructure::transport::ProtocolMessage;
use log::{debug, info, warn};

/// The coordinator a participant is talking to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorPeer {
    pub relay: OutPoint,
    pub address: String,
}

impl MixingSession {
    fn participant_role(&self) -> Option<&ParticipantRole> {
        match &self.role {
            Role::Participant(role) => Some(role),
            Role::Coordinator(_) => None,
        }
    }

    fn participant_role_mut(&mut self) -> Result<&mut ParticipantRole, MixError> {
        match &mut self.role {
            Role::Participant(role) => Ok(role),
            Role::Coordinator(_) => Err(MixError::Message("operation requires the participant role".to_string())),
        }
    }

    pub fn coordinator_peer(&self) -> Option<&CoordinatorPeer> {
        self.participant_role().and_then(|role| role.coordinator.as_ref())
    }

    pub fn has_found_coordinator(&self) -> bool {
        self.participant_role().map(|role| role.found_coordinator).unwrap_or(false)
    }

    pub fn collateral(&self) -> Option<&Transaction> {
        self.participant_role().and_then(|role| role.collateral.as_ref())
    }

    /// Block height of the last mix this participant completed.
    pub fn last_success_block(&self) -> Option<u64> {
        self.participant_role().and_then(|role| role.last_success_block)
    }

    /// The coordinator turned us away before a session was assigned.
    pub fn needs_retry(&self) -> bool {
        self.participant_role().map(|role| role.needs_retry).unwrap_or(false)
    }

    /// Whether the participant is between sessions and free to look for a coordinator.
    pub fn is_idle(&self) -> bool {
        self.participant_role().map(|role| role.coordinator.is_none() || role.needs_retry).unwrap_or(false)
    }

    pub(super) fn participant_completed(&self) -> bool {
        self.participant_role().map(|role| role.completed).unwrap_or(false)
    }

    pub(super) fn is_from_coordinator(&self, from: &str) -> bool {
        self.coordinator_peer().map(|peer| peer.address == from).unwrap_or(false)
    }

    /// Build (once) and lock the collateral bond for this session.
    pub fn ensure_collateral(&mut self) -> Result<Transaction, MixError> {
        if let Some(existing) = self.collateral() {
            return Ok(existing.clone());
        }
        let collateral = self.ctx.wallet.create_collateral_transaction()?;
        for input in &collateral.inputs {
            self.lock_coin(input.prevout)?;
        }
        self.participant_role_mut()?.collateral = Some(collateral.clone());
        debug!("collateral created txid={}", collateral.txid());
        Ok(collateral)
    }

    /// Declare `amount` to `coordinator`, bonding our collateral.
    pub fn begin_session(&mut self, coordinator: CoordinatorPeer, amount: u64) -> Result<(), MixError> {
        self.participant_role_mut()?;
        let collateral = self.ensure_collateral()?;
        let address = coordinator.address.clone();
        {
            let role = self.participant_role_mut()?;
            role.coordinator = Some(coordinator);
            role.found_coordinator = false;
            role.needs_retry = false;
            role.completed = false;
        }
        self.session_amount = amount;
        self.session_denom = denominations_by_amount(amount);
        self.last_state_change = self.now();
        info!("amount handshake sent coordinator={} amount={}", address, amount);
        self.ctx.transport.send(&address, ProtocolMessage::AmountHandshake { amount, collateral })
    }

    /// Apply a coordinator status message.
    pub fn status_update(
        &mut self,
        session_id: SessionId,
        state: SessionState,
        entries_count: u32,
        accepted: EntryAcceptance,
        message: &str,
    ) -> Result<(), MixError> {
        if self.is_coordinator() {
            return Ok(());
        }
        if self.state.is_terminal() {
            debug!("status update ignored in terminal state state={:?}", self.state);
            return Ok(());
        }
        let found = self.has_found_coordinator();
        if found && session_id != self.session_id {
            return Ok(());
        }
        self.mirror_state(state);
        debug!("status update session_id={} state={:?} entries_count={} accepted={:?}", session_id, state, entries_count, accepted);
        if !message.is_empty() {
            self.last_message = message.to_string();
        }

        match accepted {
            EntryAcceptance::Informational => {}
            EntryAcceptance::Accepted => {
                if !found && session_id != 0 {
                    self.session_id = session_id;
                    self.participant_role_mut()?.found_coordinator = true;
                    info!("coordinator accepted us session_id={}", session_id);
                }
            }
            EntryAcceptance::Rejected if !found => {
                info!("coordinator refused handshake reason={}", message);
                self.unlock_coins();
                let role = self.participant_role_mut()?;
                role.collateral = None;
                role.needs_retry = true;
                self.mirror_state(SessionState::AcceptingEntries);
            }
            EntryAcceptance::Rejected => {
                warn!("entry rejected by coordinator session_id={} reason={}", self.session_id, message);
                self.mirror_state(SessionState::Error);
            }
        }
        Ok(())
    }

    /// The coordinator announced its session is full: submit our entry.
    pub(super) fn on_coordinator_ready(&mut self, relay: &OutPoint) -> Result<(), MixError> {
        let ours = self.coordinator_peer().map(|peer| &peer.relay == relay).unwrap_or(false);
        if !ours || !self.has_found_coordinator() || !self.entries.is_empty() {
            return Ok(());
        }
        let prepared = self.ctx.wallet.prepare_denominate(0, self.session_amount)?;
        self.send_denominate(prepared.inputs, prepared.outputs, prepared.amount)
    }

    /// Lock and submit our entry to the coordinator.
    pub fn send_denominate(&mut self, inputs: Vec<EntryInput>, outputs: Vec<TxOut>, amount: u64) -> Result<(), MixError> {
        let collateral = self.collateral().cloned().ok_or(MixError::CollateralInvalid)?;
        for input in &collateral.inputs {
            self.lock_coin(input.prevout)?;
        }
        for input in &inputs {
            self.lock_coin(input.txin.prevout)?;
        }
        let Some(coordinator) = self.coordinator_peer().cloned().filter(|_| self.has_found_coordinator()) else {
            warn!("no coordinator selected, dropping entry");
            self.reset(true);
            return Err(MixError::NoCoordinator);
        };

        self.mirror_state(SessionState::AcceptingEntries);
        self.last_message.clear();
        let txins: Vec<_> = inputs.iter().map(|input| input.txin.clone()).collect();
        let candidate = Transaction::new(txins.clone(), outputs.clone());
        if !self.ctx.mempool.is_acceptable_standalone(&candidate)? {
            warn!("own entry not acceptable txid={}", candidate.txid());
            return Err(MixError::InvalidInput);
        }

        let now = self.now();
        self.entries.push(ParticipantEntry::new(inputs, outputs.clone(), amount, collateral.clone(), now));
        info!("entry submitted coordinator={} inputs={} outputs={} amount={}", coordinator.address, txins.len(), outputs.len(), amount);
        self.ctx.transport.send(&coordinator.address, ProtocolMessage::EntrySubmission { inputs: txins, amount, collateral, outputs })?;
        self.check()
    }

    /// Sign our inputs in `draft` after checking it pays every one of our outputs as
    /// declared. Returns how many inputs were signed.
    pub fn sign_final_transaction(&mut self, draft: Transaction) -> Result<usize, MixError> {
        let coordinator = self.coordinator_peer().cloned().ok_or(MixError::NoCoordinator)?;
        self.final_tx = Some(draft.clone());

        let mut signed = Vec::new();
        for entry in &self.entries {
            if own_input_positions(&draft, entry).is_empty() {
                continue;
            }
            if let Err(err) = verify_own_outputs(&draft, &entry.outputs, entry.amount) {
                warn!("refusing to sign draft txid={} reason={}", draft.txid(), err);
                return Err(err);
            }
            for input in &entry.inputs {
                let Some(index) = draft.input_position(&input.txin.prevout) else {
                    continue;
                };
                match self.ctx.wallet.sign_input(&draft, index, &input.prev_script)? {
                    Some(script_sig) => {
                        let mut txin = draft.inputs[index].clone();
                        txin.script_sig = script_sig;
                        signed.push(txin);
                    }
                    None => warn!("unable to sign own input prevout={}", input.txin.prevout),
                }
            }
        }

        let count = signed.len();
        if count > 0 {
            self.ctx.transport.send(&coordinator.address, ProtocolMessage::SignatureSubmission { inputs: signed })?;
        }
        info!("draft signed session_id={} signed_inputs={}", self.session_id, count);
        Ok(count)
    }

    /// Coordinator reported the end of the session.
    pub fn completed_transaction(&mut self, error: bool, message: &str) -> Result<(), MixError> {
        if self.is_coordinator() {
            return Ok(());
        }
        if error {
            warn!("session failed session_id={} message={}", self.session_id, message);
            self.mirror_state(SessionState::Error);
            self.check()?;
            self.unlock_coins();
        } else {
            info!("session succeeded session_id={} message={}", self.session_id, message);
            self.mirror_state(SessionState::Success);
            self.entries.clear();
            self.unlock_coins();
            let best = self.ctx.chain.best_height()?;
            self.participant_role_mut()?.last_success_block = Some(best);
        }
        self.last_message = message.to_string();
        self.participant_role_mut()?.completed = true;
        self.ctx.observer.on_completed(self.session_id, !error, message);
        Ok(())
    }
}
