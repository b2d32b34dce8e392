use crate::application::registry::RelayNodeRegistry;
use crate::domain::denomination::DenominationMask;
use crate::domain::queue::MixingQueueAnnouncement;
use crate::domain::transaction::OutPoint;
use crate::foundation::util::time::Clock;
use crate::foundation::{key_id, MixError, SigningKeypair, QUEUE_TTL_MS};
use crate::infrastructure::transport::{ProtocolMessage, Transport};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};

/// Short-lived "coordinator ready" announcements: emitted by coordinators, verified and
/// held by everyone, consumed at most once by participants picking a session.
pub struct MixingQueueBroadcaster {
    registry: Arc<RelayNodeRegistry>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    announcements: Mutex<Vec<MixingQueueAnnouncement>>,
}

impl MixingQueueBroadcaster {
    pub fn new(registry: Arc<RelayNodeRegistry>, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(registry, transport, clock, QUEUE_TTL_MS)
    }

    pub fn with_ttl(registry: Arc<RelayNodeRegistry>, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self { registry, transport, clock, ttl_ms, announcements: Mutex::new(Vec::new()) }
    }

    fn lock_announcements(&self) -> Result<MutexGuard<'_, Vec<MixingQueueAnnouncement>>, MixError> {
        self.announcements.lock().map_err(|_| crate::storage_err!("queue lock", "poisoned"))
    }

    pub fn len(&self) -> usize {
        self.announcements.lock().map(|list| list.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sign with the coordinator's messaging key and broadcast.
    pub fn announce(
        &self,
        relay: OutPoint,
        messaging: &SigningKeypair,
        denomination_mask: DenominationMask,
        ready: bool,
    ) -> Result<MixingQueueAnnouncement, MixError> {
        let mut announcement = MixingQueueAnnouncement::new(relay, denomination_mask, self.clock.now_millis(), ready);
        announcement.sign(messaging)?;
        info!("queue announcement relay={} denomination_mask={:#06b} ready={}", relay, denomination_mask, ready);
        self.transport.broadcast(ProtocolMessage::QueueAnnouncement(announcement.clone()))?;
        Ok(announcement)
    }

    /// Verify and store an announcement heard from the network, relaying it when new.
    /// `Ok(false)` for duplicates.
    pub fn receive(&self, announcement: MixingQueueAnnouncement) -> Result<bool, MixError> {
        let now = self.clock.now_millis();
        if announcement.is_expired_after(now, self.ttl_ms) {
            return Err(MixError::QueueAnnouncementRejected("expired".to_string()));
        }
        let messaging_key = self
            .registry
            .messaging_key(&announcement.relay)
            .ok_or_else(|| MixError::QueueAnnouncementRejected(format!("unknown relay node {}", announcement.relay)))?;
        if !announcement.verify(&key_id(&messaging_key)) {
            return Err(MixError::QueueAnnouncementRejected("bad signature".to_string()));
        }
        {
            let mut list = self.lock_announcements()?;
            if list.iter().any(|held| held.relay == announcement.relay && held.ready == announcement.ready) {
                debug!("duplicate queue announcement relay={} ready={}", announcement.relay, announcement.ready);
                return Ok(false);
            }
            list.push(MixingQueueAnnouncement { consumed: false, ..announcement.clone() });
        }
        self.transport.broadcast(ProtocolMessage::QueueAnnouncement(announcement))?;
        Ok(true)
    }

    /// First unexpired, unconsumed announcement with exactly `mask`; marks it consumed.
    pub fn match_and_consume(&self, mask: DenominationMask) -> Result<Option<MixingQueueAnnouncement>, MixError> {
        let now = self.clock.now_millis();
        let mut list = self.lock_announcements()?;
        let ttl_ms = self.ttl_ms;
        let found = list
            .iter_mut()
            .find(|held| !held.consumed && held.denomination_mask == mask && !held.is_expired_after(now, ttl_ms));
        Ok(found.map(|held| {
            held.consumed = true;
            held.clone()
        }))
    }

    /// Drop expired announcements. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, MixError> {
        let now = self.clock.now_millis();
        let mut list = self.lock_announcements()?;
        let before = list.len();
        list.retain(|held| !held.is_expired_after(now, self.ttl_ms));
        Ok(before - list.len())
    }
}
