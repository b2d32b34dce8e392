//! Mempool admission and script verification contract.

use crate::domain::signing::verify_input_script;
use crate::domain::transaction::{OutPoint, Transaction};
use crate::foundation::{MixError, TxId};
use crate::infrastructure::chain::ChainIndex;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

pub trait Mempool: Send + Sync {
    /// Would `tx` be accepted on its own right now.
    fn is_acceptable_standalone(&self, tx: &Transaction) -> Result<bool, MixError>;
    /// Admit and relay `tx`. `false` when rejected.
    fn admit(&self, tx: &Transaction) -> Result<bool, MixError>;
    fn verify_script(&self, script_sig: &[u8], prev_script: &[u8], tx: &Transaction, input_index: usize) -> bool;
}

#[derive(Default)]
struct MempoolInner {
    spent: HashSet<OutPoint>,
    rejected: HashSet<TxId>,
    admitted: Vec<Transaction>,
}

/// Mempool over a `ChainIndex`: inputs must resolve on chain and must not be spent by an
/// already admitted transaction.
pub struct MemoryMempool {
    chain: Arc<dyn ChainIndex>,
    inner: Mutex<MempoolInner>,
}

impl MemoryMempool {
    pub fn new(chain: Arc<dyn ChainIndex>) -> Self {
        Self { chain, inner: Mutex::new(MempoolInner::default()) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MempoolInner>, MixError> {
        self.inner.lock().map_err(|_| MixError::StorageError { operation: "memory_mempool lock".to_string(), details: "poisoned".to_string() })
    }

    /// Make every later acceptability check for this transaction fail.
    pub fn reject(&self, txid: TxId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.rejected.insert(txid);
        }
    }

    pub fn mark_spent(&self, outpoint: OutPoint) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.spent.insert(outpoint);
        }
    }

    pub fn admitted(&self) -> Vec<Transaction> {
        self.inner.lock().map(|inner| inner.admitted.clone()).unwrap_or_default()
    }

    fn acceptable(&self, inner: &MempoolInner, tx: &Transaction) -> Result<bool, MixError> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() || inner.rejected.contains(&tx.txid()) {
            return Ok(false);
        }
        let mut value_in: u64 = 0;
        let mut seen = HashSet::new();
        for input in &tx.inputs {
            if inner.spent.contains(&input.prevout) || !seen.insert(input.prevout) {
                return Ok(false);
            }
            match self.chain.output(&input.prevout)? {
                Some(out) => value_in = value_in.saturating_add(out.value),
                None => return Ok(false),
            }
        }
        Ok(value_in >= tx.total_out())
    }
}

impl Mempool for MemoryMempool {
    fn is_acceptable_standalone(&self, tx: &Transaction) -> Result<bool, MixError> {
        let inner = self.lock_inner()?;
        self.acceptable(&inner, tx)
    }

    fn admit(&self, tx: &Transaction) -> Result<bool, MixError> {
        let mut inner = self.lock_inner()?;
        if !self.acceptable(&inner, tx)? {
            debug!("mempool rejected txid={}", tx.txid());
            return Ok(false);
        }
        for input in &tx.inputs {
            inner.spent.insert(input.prevout);
        }
        inner.admitted.push(tx.clone());
        Ok(true)
    }

    fn verify_script(&self, script_sig: &[u8], prev_script: &[u8], tx: &Transaction, input_index: usize) -> bool {
        verify_input_script(script_sig, prev_script, tx, input_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{TxIn, TxOut};
    use crate::infrastructure::chain::MemoryChain;

    #[test]
    fn test_admit_marks_inputs_spent() {
        let chain = Arc::new(MemoryChain::with_height(1));
        let funding = chain.add_transaction(
            Transaction::new(vec![TxIn::new(OutPoint::new(TxId::new([1; 32]), 0))], vec![TxOut::new(100, vec![])]),
            Some(1),
        );
        let mempool = MemoryMempool::new(chain);
        let spend = Transaction::new(vec![TxIn::new(OutPoint::new(funding, 0))], vec![TxOut::new(90, vec![])]);

        assert!(mempool.is_acceptable_standalone(&spend).expect("check"));
        assert!(mempool.admit(&spend).expect("admit"));
        assert!(!mempool.is_acceptable_standalone(&spend).expect("check"));
        assert_eq!(mempool.admitted().len(), 1);
    }

    #[test]
    fn test_acceptability_rejects_unknown_or_overspending_inputs() {
        let chain = Arc::new(MemoryChain::with_height(1));
        let funding = chain.add_transaction(
            Transaction::new(vec![TxIn::new(OutPoint::new(TxId::new([2; 32]), 0))], vec![TxOut::new(100, vec![])]),
            Some(1),
        );
        let mempool = MemoryMempool::new(chain);
        let unknown = Transaction::new(vec![TxIn::new(OutPoint::new(TxId::new([9; 32]), 0))], vec![TxOut::new(1, vec![])]);
        let overspend = Transaction::new(vec![TxIn::new(OutPoint::new(funding, 0))], vec![TxOut::new(101, vec![])]);
        assert!(!mempool.is_acceptable_standalone(&unknown).expect("check"));
        assert!(!mempool.is_acceptable_standalone(&overspend).expect("check"));

        let fine = Transaction::new(vec![TxIn::new(OutPoint::new(funding, 0))], vec![TxOut::new(50, vec![])]);
        mempool.reject(fine.txid());
        assert!(!mempool.admit(&fine).expect("admit"));
    }
}
