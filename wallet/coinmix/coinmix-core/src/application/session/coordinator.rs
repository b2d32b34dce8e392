use super::{MixingSession, Role};
use crate::domain::denomination::{denominations_by_amount, denominations_of};
use crate::domain::session::{build_draft, check_collateral_shape, with_signature, EntryAcceptance, EntryInput, ParticipantEntry, SessionState};
use crate::domain::transaction::{extract_pay_to_key, OutPoint, Transaction, TxIn, TxOut};
use crate::foundation::{MixError, COMPLETION_GRACE_MS, MAX_POOL_AMOUNT};
use crate::infrastructure::transport::ProtocolMessage;
use log::{debug, info, warn};

/// Largest fee an entry may leave behind, in percent of its inputs.
const MAX_ENTRY_FEE_PERCENT: u64 = 1;

impl MixingSession {
    fn coordinator_role(&mut self) -> Result<&mut super::CoordinatorRole, MixError> {
        match &mut self.role {
            Role::Coordinator(role) => Ok(role),
            Role::Participant(_) => Err(MixError::NotCoordinator),
        }
    }

    /// Bonded collateral must resolve, burn at least the minimum fee and be acceptable on
    /// its own.
    pub fn is_collateral_valid(&self, collateral: &Transaction) -> bool {
        let chain = &self.ctx.chain;
        let resolve = |outpoint: &OutPoint| chain.output(outpoint).ok().flatten().map(|out| out.value);
        if let Err(err) = check_collateral_shape(collateral, resolve) {
            debug!("collateral rejected txid={} reason={}", collateral.txid(), err);
            return false;
        }
        match self.ctx.mempool.is_acceptable_standalone(collateral) {
            Ok(true) => true,
            Ok(false) => {
                debug!("collateral not acceptable txid={}", collateral.txid());
                false
            }
            Err(err) => {
                warn!("collateral acceptability check failed txid={} error={}", collateral.txid(), err);
                false
            }
        }
    }

    /// Amount handshake: reserve a participant slot when `amount` fits this session.
    ///
    /// The first compatible participant fixes the session denomination and moves the
    /// session into `Queue`, announcing it to the network.
    pub fn accept_participant(&mut self, amount: u64, collateral: Transaction) -> Result<(), MixError> {
        self.coordinator_role()?;
        if !self.state.is_open() {
            return Err(MixError::WrongState);
        }
        let mask = denominations_by_amount(amount);
        if mask == 0 {
            return Err(MixError::DenominationMismatch);
        }
        if !self.is_collateral_valid(&collateral) {
            return Err(MixError::CollateralInvalid);
        }

        if self.participant_count == 0 {
            self.session_denom = mask;
            self.session_amount = amount;
            self.participant_count = 1;
            self.entries.clear();
            self.last_state_change = self.now();
            let (identity, messaging) = match &self.role {
                Role::Coordinator(role) => (role.identity, role.messaging.clone()),
                Role::Participant(_) => return Err(MixError::NotCoordinator),
            };
            if let Err(err) = self.ctx.queue.announce(identity, &messaging, mask, false) {
                warn!("queue announcement failed session_id={} error={}", self.session_id, err);
            }
            self.set_state(SessionState::Queue)?;
            self.coordinator_role()?.session_collaterals.push(collateral);
            info!("session opened session_id={} denomination_mask={:#06b} amount={}", self.session_id, mask, amount);
            return Ok(());
        }

        if self.participant_count >= self.config.participant_cap {
            return Err(MixError::QueueFull);
        }
        if mask != self.session_denom {
            return Err(MixError::DenominationMismatch);
        }
        self.participant_count += 1;
        self.last_state_change = self.now();
        self.coordinator_role()?.session_collaterals.push(collateral);
        debug!("participant reserved session_id={} participant_count={}", self.session_id, self.participant_count);
        Ok(())
    }

    /// Whether a participant declaring `amount` could join right now.
    pub fn is_compatible(&self, amount: u64) -> bool {
        let mask = denominations_by_amount(amount);
        if mask == 0 {
            return false;
        }
        if self.participant_count == 0 {
            return true;
        }
        self.state.is_open() && self.participant_count < self.config.participant_cap && mask == self.session_denom
    }

    /// Accept a participant entry. Any rejection gives back the caller's reservation.
    pub fn add_entry(&mut self, inputs: Vec<TxIn>, amount: u64, collateral: Transaction, outputs: Vec<TxOut>) -> Result<(), MixError> {
        self.coordinator_role()?;
        match self.try_add_entry(inputs, amount, collateral, outputs) {
            Ok(count) => {
                self.ctx.observer.on_entry_accepted(self.session_id, count);
                Ok(())
            }
            Err(err) => {
                self.participant_count = self.participant_count.saturating_sub(1);
                info!(
                    "entry rejected session_id={} reason={} participant_count={}",
                    self.session_id, err, self.participant_count
                );
                Err(err)
            }
        }
    }

    fn try_add_entry(&mut self, inputs: Vec<TxIn>, amount: u64, collateral: Transaction, outputs: Vec<TxOut>) -> Result<usize, MixError> {
        if inputs.is_empty() || outputs.is_empty() || inputs.iter().any(|input| input.prevout.is_null()) {
            return Err(MixError::InvalidInput);
        }
        if !self.is_collateral_valid(&collateral) {
            return Err(MixError::CollateralInvalid);
        }
        if self.entries.len() >= self.config.participant_cap {
            return Err(MixError::EntriesFull);
        }
        if inputs.iter().any(|input| self.entries.iter().any(|entry| entry.contains_input(input))) {
            return Err(MixError::DuplicateInput);
        }
        if self.state != SessionState::AcceptingEntries {
            return Err(MixError::WrongState);
        }
        if denominations_of(&outputs) != self.session_denom {
            return Err(MixError::DenominationMismatch);
        }
        if outputs.iter().any(|out| extract_pay_to_key(&out.script_pubkey).is_none()) {
            debug!("entry output with non-standard script session_id={}", self.session_id);
            return Err(MixError::InvalidInput);
        }

        let mut resolved = Vec::with_capacity(inputs.len());
        let mut value_in: u64 = 0;
        for input in &inputs {
            let Some(prev) = self.ctx.chain.output(&input.prevout)? else {
                debug!("entry input unresolved prevout={}", input.prevout);
                return Err(MixError::InvalidInput);
            };
            value_in = value_in.saturating_add(prev.value);
            resolved.push(EntryInput::new(input.clone(), prev.script_pubkey));
        }
        let value_out = outputs.iter().fold(0u64, |acc, out| acc.saturating_add(out.value));
        if value_in > MAX_POOL_AMOUNT {
            debug!("entry above pool maximum value_in={}", value_in);
            return Err(MixError::InvalidInput);
        }
        if value_in < value_out || value_in - value_out > value_in / 100 * MAX_ENTRY_FEE_PERCENT {
            debug!("entry fee out of range value_in={} value_out={}", value_in, value_out);
            return Err(MixError::InvalidInput);
        }
        let candidate = Transaction::new(inputs, outputs.clone());
        if !self.ctx.mempool.is_acceptable_standalone(&candidate)? {
            debug!("entry transaction not acceptable txid={}", candidate.txid());
            return Err(MixError::InvalidInput);
        }

        let now = self.now();
        self.entries.push(ParticipantEntry::new(resolved, outputs, amount, collateral, now));
        self.last_state_change = now;
        info!("entry accepted session_id={} entries_count={}", self.session_id, self.entries.len());
        Ok(self.entries.len())
    }

    /// Record participant signatures against the current draft.
    pub fn add_script_sig(&mut self, signed_inputs: Vec<TxIn>) -> Result<(), MixError> {
        self.coordinator_role()?;
        if self.state != SessionState::Signing {
            return Err(MixError::WrongState);
        }
        for signed in signed_inputs {
            self.add_one_script_sig(&signed)?;
        }
        self.last_state_change = self.now();
        self.check()?;
        self.relay_status(EntryAcceptance::Informational, "");
        Ok(())
    }

    fn add_one_script_sig(&mut self, signed: &TxIn) -> Result<(), MixError> {
        let draft = self.final_tx.as_ref().ok_or(MixError::WrongState)?;
        let entry_input = self
            .entries
            .iter()
            .flat_map(|entry| entry.inputs.iter())
            .find(|input| input.txin.same_reference(signed))
            .ok_or_else(|| MixError::InvalidSignature(format!("unknown input {}", signed.prevout)))?;
        if entry_input.has_sig {
            return Err(MixError::SignatureDuplicate(signed.prevout.to_string()));
        }
        let (candidate, index) = with_signature(draft, signed).ok_or_else(|| MixError::InvalidSignature(format!("input {} not in draft", signed.prevout)))?;
        if !self.ctx.mempool.verify_script(&signed.script_sig, &entry_input.prev_script, &candidate, index) {
            warn!("signature verification failed session_id={} input_index={}", self.session_id, index);
            return Err(MixError::ScriptVerificationFailed { input_index: index });
        }

        if let Some(draft) = self.final_tx.as_mut() {
            draft.inputs[index].script_sig = signed.script_sig.clone();
        }
        for entry in &mut self.entries {
            if entry.add_sig(signed) {
                break;
            }
        }
        debug!("signature recorded session_id={} input_index={}", self.session_id, index);
        Ok(())
    }

    pub fn signatures_complete(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(ParticipantEntry::is_fully_signed)
    }

    pub(super) fn advance_coordinator(&mut self) -> Result<(), MixError> {
        if self.state == SessionState::Queue && self.participant_count >= self.config.participant_cap {
            let (identity, messaging) = match &self.role {
                Role::Coordinator(role) => (role.identity, role.messaging.clone()),
                Role::Participant(_) => return Err(MixError::NotCoordinator),
            };
            if let Err(err) = self.ctx.queue.announce(identity, &messaging, self.session_denom, true) {
                warn!("ready announcement failed session_id={} error={}", self.session_id, err);
            }
            self.set_state(SessionState::AcceptingEntries)?;
        }

        if self.state == SessionState::AcceptingEntries && self.entries.len() >= self.config.participant_cap {
            self.set_state(SessionState::FinalizeTransaction)?;
        }

        if self.state == SessionState::FinalizeTransaction {
            if self.final_tx.is_some() {
                self.fail_session(&MixError::DraftAlreadyPresent.to_string());
                return Ok(());
            }
            self.finalize_draft()?;
        }

        if self.state == SessionState::Signing && self.signatures_complete() {
            self.commit_final_transaction()?;
        }

        if self.state == SessionState::Transmission && self.idle_millis() >= COMPLETION_GRACE_MS {
            debug!("transmission grace elapsed session_id={}", self.session_id);
            self.reset(true);
        }
        Ok(())
    }

    fn finalize_draft(&mut self) -> Result<(), MixError> {
        let draft = match &mut self.role {
            Role::Coordinator(role) => build_draft(&self.entries, &mut role.rng),
            Role::Participant(_) => return Err(MixError::NotCoordinator),
        };
        info!(
            "draft built session_id={} inputs={} outputs={} txid={}",
            self.session_id,
            draft.inputs.len(),
            draft.outputs.len(),
            draft.txid()
        );
        self.final_tx = Some(draft.clone());
        self.set_state(SessionState::Signing)?;
        self.ctx.transport.broadcast(ProtocolMessage::FinalizedDraft { session_id: self.session_id, transaction: draft })
    }

    /// Submit the fully signed draft. A mempool rejection resets the session and tells
    /// every participant; the draft is never retried.
    fn commit_final_transaction(&mut self) -> Result<(), MixError> {
        let Some(tx) = self.final_tx.clone() else {
            return Err(MixError::WrongState);
        };
        let txid = tx.txid();
        if !self.ctx.mempool.admit(&tx)? {
            warn!("final transaction rejected by mempool session_id={} txid={}", self.session_id, txid);
            self.notify_completion(true, "transaction not valid, please try again");
            self.ctx.observer.on_completed(self.session_id, false, "mempool rejected");
            self.reset(true);
            return Ok(());
        }
        info!("final transaction admitted session_id={} txid={}", self.session_id, txid);
        self.notify_completion(false, "transaction created successfully");
        self.ctx.observer.on_completed(self.session_id, true, "transaction created successfully");
        self.set_state(SessionState::Transmission)
    }

    fn notify_completion(&self, error: bool, message: &str) {
        let notice = ProtocolMessage::CompletionNotice { session_id: self.session_id, error, message: message.to_string() };
        if let Err(err) = self.ctx.transport.broadcast(notice) {
            warn!("completion notice failed session_id={} error={}", self.session_id, err);
        }
    }

    /// Abnormal end: release everything, land in `Error` and tell participants.
    pub(super) fn fail_session(&mut self, message: &str) {
        warn!("session failed session_id={} role={:?} message={}", self.session_id, self.role(), message);
        if self.is_coordinator() {
            self.notify_completion(true, message);
        }
        self.ctx.observer.on_completed(self.session_id, false, message);
        self.reset(false);
        self.apply_state(SessionState::Error);
        self.last_message = message.to_string();
    }

    /// Forfeit collateral of participants that stalled the session: unmatched handshakes
    /// while accepting entries, unsigned inputs while signing. Best effort; returns how
    /// many collateral transactions were submitted.
    pub fn charge_fees(&mut self) -> usize {
        let offenders: Vec<Transaction> = match (&self.role, self.state) {
            (Role::Coordinator(role), SessionState::AcceptingEntries | SessionState::Queue) => role
                .session_collaterals
                .iter()
                .filter(|collateral| !self.entries.iter().any(|entry| &entry.collateral == *collateral))
                .cloned()
                .collect(),
            (Role::Coordinator(_), SessionState::Signing) => {
                self.entries.iter().filter(|entry| !entry.is_fully_signed()).map(|entry| entry.collateral.clone()).collect()
            }
            _ => return 0,
        };
        if offenders.is_empty() {
            return 0;
        }
        for collateral in &offenders {
            let txid = collateral.txid();
            let admitted = match self.ctx.mempool.admit(collateral) {
                Ok(admitted) => admitted,
                Err(err) => {
                    warn!("collateral forfeit failed session_id={} txid={} error={}", self.session_id, txid, err);
                    false
                }
            };
            self.ctx.observer.on_collateral_forfeited(self.session_id, &txid, admitted);
        }
        offenders.len()
    }
}
