//! Per-height payment winners: election, signed submissions, pruning and sync.

use crate::application::registry::RelayNodeRegistry;
use crate::domain::payment::{passes_rotation, PaymentWinner};
use crate::domain::relay::payment_score;
use crate::domain::transaction::OutPoint;
use crate::foundation::{
    BlockHash, KeyId, MixError, SigningKeypair, MAX_SYNC_REQUESTS_PER_PEER, PAYMENT_MATURITY_OFFSET, PAYMENT_PRUNE_DEPTH,
    PAYMENT_SYNC_AHEAD, PAYMENT_SYNC_BEHIND, RELAY_COLLATERAL,
};
use crate::infrastructure::chain::ChainIndex;
use crate::infrastructure::transport::{ProtocolMessage, Transport};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

pub struct PaymentWinnerLedger {
    registry: Arc<RelayNodeRegistry>,
    chain: Arc<dyn ChainIndex>,
    transport: Arc<dyn Transport>,
    authority: KeyId,
    /// Present only on the node holding the payments authority key.
    signer: Option<SigningKeypair>,
    winners: RwLock<BTreeMap<u64, PaymentWinner>>,
    sync_requests: Mutex<HashMap<String, u32>>,
}

impl PaymentWinnerLedger {
    pub fn new(registry: Arc<RelayNodeRegistry>, chain: Arc<dyn ChainIndex>, transport: Arc<dyn Transport>, authority: KeyId) -> Self {
        Self {
            registry,
            chain,
            transport,
            authority,
            signer: None,
            winners: RwLock::new(BTreeMap::new()),
            sync_requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_signer(mut self, signer: SigningKeypair) -> Result<Self, MixError> {
        if signer.key_id() != self.authority {
            return Err(MixError::ConfigError("payment signer does not match the authority key".to_string()));
        }
        self.signer = Some(signer);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.winners.read().map(|winners| winners.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maturity_reference(&self, height: u64) -> Result<Option<BlockHash>, MixError> {
        let Some(reference_height) = height.checked_sub(PAYMENT_MATURITY_OFFSET) else {
            return Ok(None);
        };
        match self.chain.hash_at_height(reference_height)? {
            Some(hash) => Ok(Some(hash)),
            None => Err(MixError::UnknownHeight(reference_height)),
        }
    }

    /// Blocks since `collateral` was last paid, bounded by the age of its collateral.
    pub fn last_payment(&self, collateral: &OutPoint) -> Result<u64, MixError> {
        let best = self.chain.best_height()?;
        let mut since = self.registry.input_age(collateral)?;
        let winners = self.winners.read().map_err(|_| crate::storage_err!("payment_ledger read", "poisoned"))?;
        // a win at or past the tip counts as paid just now
        for winner in winners.values().filter(|winner| &winner.collateral == collateral) {
            since = since.min(best.saturating_sub(winner.height));
        }
        Ok(since)
    }

    /// Highest-scoring enabled node that passed the rotation threshold, unsigned.
    pub fn compute_winner(&self, height: u64) -> Result<Option<PaymentWinner>, MixError> {
        let Some(reference) = self.maturity_reference(height)? else {
            return Ok(None);
        };
        let candidates = self.registry.enabled_nodes();
        let node_count = candidates.len();
        let mut best: Option<PaymentWinner> = None;
        for node in candidates {
            let since = self.last_payment(&node.collateral)?;
            if !passes_rotation(since, node_count) {
                debug!("payment candidate skipped collateral={} blocks_since_payment={} node_count={}", node.collateral, since, node_count);
                continue;
            }
            let score = payment_score(&node.collateral, &reference);
            if best.as_ref().map_or(true, |top| score > top.score) {
                best = Some(PaymentWinner::new(height, node.collateral, score));
            }
        }
        Ok(best)
    }

    /// Keep `winner` if its height is free or it beats the stored score.
    pub fn record(&self, winner: PaymentWinner) -> Result<bool, MixError> {
        let mut winners = self.winners.write().map_err(|_| crate::storage_err!("payment_ledger write", "poisoned"))?;
        match winners.get(&winner.height) {
            Some(existing) if existing.score >= winner.score => Ok(false),
            _ => {
                debug!("payment winner stored height={} collateral={} score={}", winner.height, winner.collateral, winner.score);
                winners.insert(winner.height, winner);
                Ok(true)
            }
        }
    }

    /// Accept a signed winner from the network. The claimed score is replaced by the locally
    /// computed one before comparison.
    pub fn submit(&self, mut winner: PaymentWinner) -> Result<bool, MixError> {
        if !winner.verify(&self.authority) {
            return Err(MixError::PaymentRejected(format!("bad authority signature for height {}", winner.height)));
        }
        let reference = self
            .maturity_reference(winner.height)?
            .ok_or_else(|| MixError::PaymentRejected(format!("height {} has no maturity reference", winner.height)))?;
        winner.score = payment_score(&winner.collateral, &reference);
        self.record(winner)
    }

    pub fn winner_at(&self, height: u64) -> Option<PaymentWinner> {
        self.winners.read().ok().and_then(|winners| winners.get(&height).cloned())
    }

    /// Output script of the winning node's bonded collateral output.
    pub fn payee_script_at(&self, height: u64) -> Result<Option<Vec<u8>>, MixError> {
        let Some(winner) = self.winner_at(height) else {
            return Ok(None);
        };
        let Some(tx) = self.chain.transaction_by_hash(&winner.collateral.txid)? else {
            return Ok(None);
        };
        Ok(tx.outputs.into_iter().find(|out| out.value == RELAY_COLLATERAL).map(|out| out.script_pubkey))
    }

    pub fn prune(&self, best_height: u64) -> Result<usize, MixError> {
        let mut winners = self.winners.write().map_err(|_| crate::storage_err!("payment_ledger write", "poisoned"))?;
        let before = winners.len();
        winners.retain(|height, _| best_height.saturating_sub(*height) <= PAYMENT_PRUNE_DEPTH);
        Ok(before - winners.len())
    }

    /// Entries inside the sync window around the tip, capped per peer per cadence.
    pub fn sync_entries(&self, peer: &str) -> Result<Vec<PaymentWinner>, MixError> {
        {
            let mut requests = self.sync_requests.lock().map_err(|_| crate::storage_err!("payment_ledger sync", "poisoned"))?;
            let count = requests.entry(peer.to_string()).or_insert(0);
            if *count >= MAX_SYNC_REQUESTS_PER_PEER {
                warn!("payment sync refused peer={} requests={}", peer, count);
                return Ok(Vec::new());
            }
            *count += 1;
        }
        let best = self.chain.best_height()?;
        let low = best.saturating_sub(PAYMENT_SYNC_BEHIND);
        let high = best.saturating_add(PAYMENT_SYNC_AHEAD);
        let winners = self.winners.read().map_err(|_| crate::storage_err!("payment_ledger read", "poisoned"))?;
        Ok(winners.range(low..=high).map(|(_, winner)| winner.clone()).collect())
    }

    pub fn reset_sync_counters(&self) {
        if let Ok(mut requests) = self.sync_requests.lock() {
            requests.clear();
        }
    }

    /// Vote for `height`: elect, sign with the authority key, store and relay.
    /// No-op on nodes without the authority key.
    pub fn process_block(&self, height: u64) -> Result<Option<PaymentWinner>, MixError> {
        let Some(signer) = self.signer.as_ref() else {
            return Ok(None);
        };
        let Some(mut winner) = self.compute_winner(height)? else {
            debug!("no payment candidate height={}", height);
            return Ok(None);
        };
        winner.sign(signer)?;
        if self.record(winner.clone())? {
            info!("payment winner elected height={} collateral={} score={}", winner.height, winner.collateral, winner.score);
            self.transport.broadcast(ProtocolMessage::PaymentWinner(winner.clone()))?;
        }
        Ok(Some(winner))
    }
}
