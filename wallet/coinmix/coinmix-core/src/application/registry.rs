//! Relay node registry: admission, liveness and election over the known node set.

use crate::domain::relay::{
    classify_liveness, election_score, reference_checkpoint_height, truncate_score_32, EligibilityState, RelayAnnouncement, RelayNode,
    RelayPing,
};
use crate::domain::transaction::{pay_to_key_script, OutPoint, Transaction, TxIn, TxOut};
use crate::foundation::util::time::Clock;
use crate::foundation::{
    key_id, MixError, COLLATERAL_MIN, MAX_SYNC_REQUESTS_PER_PEER, RELAY_COLLATERAL, RELAY_MAX_FUTURE_MS, RELAY_MIN_CONFIRMATIONS,
    RELAY_MIN_PING_MS,
};
use crate::infrastructure::chain::ChainIndex;
use crate::infrastructure::mempool::Mempool;
use log::{debug, info, warn};
use primitive_types::U256;
use rand::Rng;
use secp256k1::PublicKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Known relay nodes in first-seen order.
pub struct RelayNodeRegistry {
    chain: Arc<dyn ChainIndex>,
    mempool: Arc<dyn Mempool>,
    clock: Arc<dyn Clock>,
    nodes: RwLock<Vec<RelayNode>>,
    sync_requests: Mutex<HashMap<String, u32>>,
}

impl RelayNodeRegistry {
    pub fn new(chain: Arc<dyn ChainIndex>, mempool: Arc<dyn Mempool>, clock: Arc<dyn Clock>) -> Self {
        Self { chain, mempool, clock, nodes: RwLock::new(Vec::new()), sync_requests: Mutex::new(HashMap::new()) }
    }

    fn read_nodes(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<RelayNode>>, MixError> {
        self.nodes.read().map_err(|_| crate::storage_err!("relay_registry read", "poisoned"))
    }

    fn write_nodes(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<RelayNode>>, MixError> {
        self.nodes.write().map_err(|_| crate::storage_err!("relay_registry write", "poisoned"))
    }

    pub fn len(&self) -> usize {
        self.nodes.read().map(|nodes| nodes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enabled_count(&self) -> usize {
        self.nodes.read().map(|nodes| nodes.iter().filter(|node| node.is_enabled()).count()).unwrap_or(0)
    }

    pub fn get(&self, collateral: &OutPoint) -> Option<RelayNode> {
        self.nodes.read().ok().and_then(|nodes| nodes.iter().find(|node| &node.collateral == collateral).cloned())
    }

    pub fn nodes(&self) -> Vec<RelayNode> {
        self.nodes.read().map(|nodes| nodes.clone()).unwrap_or_default()
    }

    pub fn enabled_nodes(&self) -> Vec<RelayNode> {
        self.nodes.read().map(|nodes| nodes.iter().filter(|node| node.is_enabled()).cloned().collect()).unwrap_or_default()
    }

    pub fn messaging_key(&self, collateral: &OutPoint) -> Option<PublicKey> {
        self.get(collateral).map(|node| node.messaging_key)
    }

    /// Would spending the node's collateral still be accepted, i.e. is the bond intact.
    fn collateral_acceptable(&self, collateral: &OutPoint) -> bool {
        let probe = Transaction::new(vec![TxIn::new(*collateral)], vec![TxOut::new(RELAY_COLLATERAL - COLLATERAL_MIN, Vec::new())]);
        match self.mempool.is_acceptable_standalone(&probe) {
            Ok(acceptable) => acceptable,
            Err(err) => {
                warn!("collateral probe failed collateral={} error={}", collateral, err);
                false
            }
        }
    }

    /// Confirmations of the transaction holding `outpoint`; zero when unconfirmed.
    pub fn input_age(&self, outpoint: &OutPoint) -> Result<u64, MixError> {
        Ok(self.chain.confirmations(&outpoint.txid)?.unwrap_or(0))
    }

    /// Validate and apply a self-announcement. `Ok(true)` when the registry changed and the
    /// announcement should be relayed further.
    pub fn accept_announcement(&self, announcement: RelayAnnouncement) -> Result<bool, MixError> {
        let now = self.clock.now_millis();
        if announcement.sig_time > now.saturating_add(RELAY_MAX_FUTURE_MS) {
            return Err(MixError::RelayAnnouncementRejected("signature time too far in the future".to_string()));
        }
        if !announcement.verify_signature() {
            return Err(MixError::RelayAnnouncementRejected("bad signature".to_string()));
        }

        if let Some(known) = self.get(&announcement.collateral) {
            if known.operator_key != announcement.operator_key {
                return Err(MixError::RelayAnnouncementRejected("operator key does not match registered node".to_string()));
            }
            if announcement.sig_time <= known.sig_time {
                debug!("stale relay announcement ignored collateral={} sig_time={}", announcement.collateral, announcement.sig_time);
                return Ok(false);
            }
            let collateral = announcement.collateral;
            let acceptable = self.collateral_acceptable(&collateral);
            let mut nodes = self.write_nodes()?;
            if let Some(node) = nodes.iter_mut().find(|node| node.collateral == collateral) {
                let last_ping_time = node.last_ping_time;
                let current = node.state;
                *node = announcement.into_node(now);
                node.last_ping_time = last_ping_time;
                node.state = classify_liveness(current, node.last_seen, now, || acceptable);
                info!("relay node updated collateral={} address={} state={:?}", node.collateral, node.address, node.state);
            }
            return Ok(true);
        }

        let owner = self
            .chain
            .output(&announcement.collateral)?
            .ok_or_else(|| MixError::RelayAnnouncementRejected(format!("unknown collateral {}", announcement.collateral)))?;
        if owner.value != RELAY_COLLATERAL {
            return Err(MixError::RelayAnnouncementRejected(format!("collateral value {} is not the relay bond", owner.value)));
        }
        if owner.script_pubkey != pay_to_key_script(&key_id(&announcement.operator_key)) {
            return Err(MixError::RelayAnnouncementRejected("collateral is not owned by the operator key".to_string()));
        }
        let confirmations = self.input_age(&announcement.collateral)?;
        if confirmations < RELAY_MIN_CONFIRMATIONS {
            return Err(MixError::RelayAnnouncementRejected(format!("collateral has {} confirmations", confirmations)));
        }
        if !self.collateral_acceptable(&announcement.collateral) {
            return Err(MixError::RelayAnnouncementRejected("collateral is spent".to_string()));
        }

        let mut node = announcement.into_node(now);
        node.state = EligibilityState::Enabled;
        let mut nodes = self.write_nodes()?;
        if nodes.iter().any(|existing| existing.collateral == node.collateral) {
            return Ok(false);
        }
        info!("relay node admitted collateral={} address={} total_nodes={}", node.collateral, node.address, nodes.len() + 1);
        nodes.push(node);
        Ok(true)
    }

    /// Refresh last-seen from a ping. Pings arriving within the minimum interval are ignored.
    pub fn accept_ping(&self, ping: &RelayPing) -> Result<bool, MixError> {
        let now = self.clock.now_millis();
        if ping.sig_time > now.saturating_add(RELAY_MAX_FUTURE_MS) {
            return Err(MixError::RelayAnnouncementRejected("ping time too far in the future".to_string()));
        }
        let mut nodes = self.write_nodes()?;
        let node = nodes
            .iter_mut()
            .find(|node| node.collateral == ping.collateral)
            .ok_or_else(|| MixError::UnknownRelayNode(ping.collateral.to_string()))?;
        if ping.sig_time <= node.last_ping_time {
            return Ok(false);
        }
        if !ping.verify_signature(&node.messaging_key) {
            return Err(MixError::RelayAnnouncementRejected("bad ping signature".to_string()));
        }
        if now.saturating_sub(node.last_seen) < RELAY_MIN_PING_MS {
            debug!("relay ping too soon collateral={} last_seen={}", node.collateral, node.last_seen);
            return Ok(false);
        }
        node.last_ping_time = ping.sig_time;
        node.last_seen = now;
        Ok(true)
    }

    /// Re-evaluate one node's eligibility.
    pub fn check_liveness(&self, collateral: &OutPoint) -> Result<Option<EligibilityState>, MixError> {
        let Some(node) = self.get(collateral) else {
            return Ok(None);
        };
        let now = self.clock.now_millis();
        let next = classify_liveness(node.state, node.last_seen, now, || self.collateral_acceptable(collateral));
        let mut nodes = self.write_nodes()?;
        if let Some(stored) = nodes.iter_mut().find(|stored| &stored.collateral == collateral) {
            if stored.state != next {
                debug!("relay node state change collateral={} from={:?} to={:?}", collateral, stored.state, next);
            }
            stored.state = next;
        }
        Ok(Some(next))
    }

    pub fn check_all(&self) -> Result<(), MixError> {
        let collaterals: Vec<OutPoint> = self.read_nodes()?.iter().map(|node| node.collateral).collect();
        for collateral in collaterals {
            self.check_liveness(&collateral)?;
        }
        Ok(())
    }

    /// Drop nodes pending removal or with spent collateral. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, MixError> {
        let mut nodes = self.write_nodes()?;
        let before = nodes.len();
        nodes.retain(|node| !node.state.is_removable());
        let removed = before - nodes.len();
        if removed > 0 {
            info!("relay registry sweep removed={} remaining={}", removed, nodes.len());
        }
        Ok(removed)
    }

    fn reference_hash(&self, modulus: u64, target_height: Option<u64>) -> Result<Option<crate::foundation::BlockHash>, MixError> {
        let best = self.chain.best_height()?;
        let Some(height) = reference_checkpoint_height(best, modulus, target_height) else {
            return Ok(None);
        };
        self.chain.hash_at_height(height)
    }

    /// Full-width election score of a node, `None` while no reference checkpoint exists.
    pub fn score(&self, collateral: &OutPoint, modulus: u64, target_height: Option<u64>) -> Result<Option<U256>, MixError> {
        Ok(self.reference_hash(modulus, target_height)?.map(|reference| election_score(collateral, &reference)))
    }

    /// Enabled nodes paired with their truncated score, in first-seen order.
    fn scored_enabled(&self, modulus: u64, target_height: Option<u64>) -> Result<Vec<(u32, RelayNode)>, MixError> {
        let Some(reference) = self.reference_hash(modulus, target_height)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .read_nodes()?
            .iter()
            .filter(|node| node.is_enabled())
            .map(|node| (truncate_score_32(election_score(&node.collateral, &reference)), node.clone()))
            .collect())
    }

    /// Highest-scoring enabled node; the first one seen wins a tie.
    pub fn current_leader(&self, modulus: u64, target_height: Option<u64>) -> Result<Option<RelayNode>, MixError> {
        let mut best: Option<(u32, RelayNode)> = None;
        for (score, node) in self.scored_enabled(modulus, target_height)? {
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, node));
            }
        }
        Ok(best.map(|(_, node)| node))
    }

    fn ranked(&self, modulus: u64, target_height: Option<u64>) -> Result<Vec<RelayNode>, MixError> {
        let mut scored = self.scored_enabled(modulus, target_height)?;
        // stable: equal scores keep first-seen order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, node)| node).collect())
    }

    /// 1-based position by descending score, `None` for unknown or disabled nodes.
    pub fn rank(&self, collateral: &OutPoint, modulus: u64, target_height: Option<u64>) -> Result<Option<usize>, MixError> {
        Ok(self.ranked(modulus, target_height)?.iter().position(|node| &node.collateral == collateral).map(|idx| idx + 1))
    }

    pub fn node_by_rank(&self, rank: usize, modulus: u64, target_height: Option<u64>) -> Result<Option<RelayNode>, MixError> {
        if rank == 0 {
            return Ok(None);
        }
        Ok(self.ranked(modulus, target_height)?.into_iter().nth(rank - 1))
    }

    /// Uniform pick among enabled nodes.
    pub fn random_enabled<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RelayNode> {
        let enabled = self.enabled_nodes();
        if enabled.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..enabled.len());
        enabled.into_iter().nth(idx)
    }

    /// Announcements to replay to `peer`. Requests past the per-peer cap get nothing until
    /// the counters are reset.
    pub fn sync_announcements(&self, peer: &str, collateral: Option<&OutPoint>) -> Result<Vec<RelayAnnouncement>, MixError> {
        {
            let mut requests = self.sync_requests.lock().map_err(|_| crate::storage_err!("relay_registry sync", "poisoned"))?;
            let count = requests.entry(peer.to_string()).or_insert(0);
            if *count >= MAX_SYNC_REQUESTS_PER_PEER {
                warn!("registry sync refused peer={} requests={}", peer, count);
                return Ok(Vec::new());
            }
            *count += 1;
        }
        let nodes = self.read_nodes()?;
        Ok(nodes
            .iter()
            .filter(|node| node.is_enabled())
            .filter(|node| collateral.map_or(true, |wanted| &node.collateral == wanted))
            .map(RelayAnnouncement::from_node)
            .collect())
    }

    pub fn reset_sync_counters(&self) {
        if let Ok(mut requests) = self.sync_requests.lock() {
            requests.clear();
        }
    }
}
