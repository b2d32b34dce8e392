//! Read-only chain index consumed by the election and collateral checks.

use crate::domain::transaction::{OutPoint, Transaction, TxOut};
use crate::foundation::{BlockHash, MixError, TxId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub trait ChainIndex: Send + Sync {
    fn best_height(&self) -> Result<u64, MixError>;
    fn hash_at_height(&self, height: u64) -> Result<Option<BlockHash>, MixError>;
    fn transaction_by_hash(&self, txid: &TxId) -> Result<Option<Transaction>, MixError>;
    /// Confirmations of a transaction, `None` when unconfirmed or unknown.
    fn confirmations(&self, txid: &TxId) -> Result<Option<u64>, MixError>;
    fn is_initial_download(&self) -> Result<bool, MixError>;

    fn output(&self, outpoint: &OutPoint) -> Result<Option<TxOut>, MixError> {
        Ok(self.transaction_by_hash(&outpoint.txid)?.and_then(|tx| tx.outputs.get(outpoint.index as usize).cloned()))
    }
}

#[derive(Default)]
struct ChainInner {
    blocks: Vec<BlockHash>,
    transactions: HashMap<TxId, (Transaction, Option<u64>)>,
    initial_download: bool,
}

/// In-memory chain: block hashes by height plus an index of known transactions.
///
/// Height 0 is the genesis block and is present from construction.
pub struct MemoryChain {
    inner: Mutex<ChainInner>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self { inner: Mutex::new(ChainInner { blocks: vec![Self::synthetic_hash(0)], ..Default::default() }) }
    }

    /// Chain with synthetic block hashes up to and including `height`.
    pub fn with_height(height: u64) -> Self {
        let chain = Self::new();
        chain.extend_to(height);
        chain
    }

    pub fn synthetic_hash(height: u64) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"coinmix:test-block:");
        hasher.update(&height.to_le_bytes());
        BlockHash::new(*hasher.finalize().as_bytes())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, ChainInner>, MixError> {
        self.inner.lock().map_err(|_| MixError::StorageError { operation: "memory_chain lock".to_string(), details: "poisoned".to_string() })
    }

    pub fn push_block(&self, hash: BlockHash) -> u64 {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.blocks.push(hash);
                (inner.blocks.len() - 1) as u64
            }
            Err(_) => 0,
        }
    }

    pub fn extend_to(&self, height: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            while (inner.blocks.len() as u64) <= height {
                let next = inner.blocks.len() as u64;
                inner.blocks.push(Self::synthetic_hash(next));
            }
        }
    }

    /// Index a transaction, optionally as confirmed at `height`.
    pub fn add_transaction(&self, tx: Transaction, height: Option<u64>) -> TxId {
        let txid = tx.txid();
        if let Ok(mut inner) = self.inner.lock() {
            inner.transactions.insert(txid, (tx, height));
        }
        txid
    }

    pub fn set_initial_download(&self, value: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.initial_download = value;
        }
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainIndex for MemoryChain {
    fn best_height(&self) -> Result<u64, MixError> {
        Ok(self.lock_inner()?.blocks.len().saturating_sub(1) as u64)
    }

    fn hash_at_height(&self, height: u64) -> Result<Option<BlockHash>, MixError> {
        let inner = self.lock_inner()?;
        Ok(usize::try_from(height).ok().and_then(|h| inner.blocks.get(h).copied()))
    }

    fn transaction_by_hash(&self, txid: &TxId) -> Result<Option<Transaction>, MixError> {
        Ok(self.lock_inner()?.transactions.get(txid).map(|(tx, _)| tx.clone()))
    }

    fn confirmations(&self, txid: &TxId) -> Result<Option<u64>, MixError> {
        let inner = self.lock_inner()?;
        let best = inner.blocks.len().saturating_sub(1) as u64;
        Ok(inner.transactions.get(txid).and_then(|(_, height)| *height).map(|height| best.saturating_sub(height) + 1))
    }

    fn is_initial_download(&self) -> Result<bool, MixError> {
        Ok(self.lock_inner()?.initial_download)
    }
}
