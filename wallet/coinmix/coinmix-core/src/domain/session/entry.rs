use crate::domain::transaction::{Transaction, TxIn, TxOut};
use crate::foundation::{TimestampMs, ENTRY_TTL_MS};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    pub txin: TxIn,
    /// Script of the output this input spends.
    pub prev_script: Vec<u8>,
    pub has_sig: bool,
}

impl EntryInput {
    pub fn new(txin: TxIn, prev_script: Vec<u8>) -> Self {
        Self { txin, prev_script, has_sig: false }
    }
}

/// One participant's contribution to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub inputs: Vec<EntryInput>,
    pub outputs: Vec<TxOut>,
    pub amount: u64,
    pub collateral: Transaction,
    pub added_at: TimestampMs,
}

impl ParticipantEntry {
    pub fn new(inputs: Vec<EntryInput>, outputs: Vec<TxOut>, amount: u64, collateral: Transaction, added_at: TimestampMs) -> Self {
        Self { inputs, outputs, amount, collateral, added_at }
    }

    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.is_expired_after(now, ENTRY_TTL_MS)
    }

    pub fn is_expired_after(&self, now: TimestampMs, ttl_ms: u64) -> bool {
        now.saturating_sub(self.added_at) > ttl_ms
    }

    pub fn contains_input(&self, txin: &TxIn) -> bool {
        self.inputs.iter().any(|input| input.txin.prevout == txin.prevout)
    }

    /// Record a signature for a matching, still unsigned input.
    pub fn add_sig(&mut self, signed: &TxIn) -> bool {
        for input in &mut self.inputs {
            if input.txin.same_reference(signed) {
                if input.has_sig {
                    return false;
                }
                input.txin.script_sig = signed.script_sig.clone();
                input.has_sig = true;
                return true;
            }
        }
        false
    }

    pub fn is_fully_signed(&self) -> bool {
        self.inputs.iter().all(|input| input.has_sig)
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, out| acc.saturating_add(out.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::OutPoint;
    use crate::foundation::TxId;

    #[test]
    fn test_add_sig_sets_flag_once() {
        let txin = TxIn::new(OutPoint::new(TxId::new([1; 32]), 0));
        let mut entry = ParticipantEntry::new(vec![EntryInput::new(txin.clone(), vec![])], vec![], 0, Transaction::default(), 0);
        let mut signed = txin;
        signed.script_sig = vec![1, 2, 3];
        assert!(!entry.is_fully_signed());
        assert!(entry.add_sig(&signed));
        assert!(!entry.add_sig(&signed));
        assert!(entry.is_fully_signed());
        assert_eq!(entry.inputs[0].txin.script_sig, vec![1, 2, 3]);
    }

    #[test]
    fn test_entry_expiry() {
        let entry = ParticipantEntry::new(vec![], vec![], 0, Transaction::default(), 10);
        assert!(!entry.is_expired(10 + ENTRY_TTL_MS));
        assert!(entry.is_expired(11 + ENTRY_TTL_MS));
    }
}
