//! Joint transaction assembly and the participant-side payout check.

use crate::domain::session::entry::ParticipantEntry;
use crate::domain::transaction::{Transaction, TxIn, TxOut};
use crate::foundation::MixError;
use rand::seq::SliceRandom;
use rand::Rng;

/// Entries concatenated in submission order: outputs, then inputs of each entry.
pub fn assemble_unshuffled(entries: &[ParticipantEntry]) -> Transaction {
    let mut outputs = Vec::new();
    let mut inputs = Vec::new();
    for entry in entries {
        outputs.extend(entry.outputs.iter().cloned());
        inputs.extend(entry.inputs.iter().map(|input| input.txin.clone()));
    }
    Transaction::new(inputs, outputs)
}

/// Unsigned draft with its outputs randomly permuted.
pub fn build_draft<R: Rng + ?Sized>(entries: &[ParticipantEntry], rng: &mut R) -> Transaction {
    let mut draft = assemble_unshuffled(entries);
    for input in &mut draft.inputs {
        input.script_sig.clear();
    }
    draft.outputs.shuffle(rng);
    draft
}

/// Every one of `outputs` must appear in `draft` (each matched to a distinct draft output)
/// and together they must pay exactly `declared_amount`.
pub fn verify_own_outputs(draft: &Transaction, outputs: &[TxOut], declared_amount: u64) -> Result<(), MixError> {
    let mut used = vec![false; draft.outputs.len()];
    let mut total: u64 = 0;
    for own in outputs {
        let slot = draft.outputs.iter().enumerate().position(|(idx, candidate)| !used[idx] && candidate == own);
        match slot {
            Some(idx) => {
                used[idx] = true;
                total = total.saturating_add(own.value);
            }
            None => return Err(MixError::DraftMismatch(format!("missing output value={}", own.value))),
        }
    }
    if total != declared_amount {
        return Err(MixError::DraftMismatch(format!("outputs total={} declared={}", total, declared_amount)));
    }
    Ok(())
}

/// Positions in `draft` of the entry's inputs that are present.
pub fn own_input_positions(draft: &Transaction, entry: &ParticipantEntry) -> Vec<usize> {
    entry.inputs.iter().filter_map(|input| draft.input_position(&input.txin.prevout)).collect()
}

/// Copy of `base` with `signed`'s script signature applied to its matching input.
pub fn with_signature(base: &Transaction, signed: &TxIn) -> Option<(Transaction, usize)> {
    let index = base.inputs.iter().position(|input| input.same_reference(signed))?;
    let mut candidate = base.clone();
    candidate.inputs[index].script_sig = signed.script_sig.clone();
    Some((candidate, index))
}
