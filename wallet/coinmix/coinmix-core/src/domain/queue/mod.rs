use crate::domain::denomination::DenominationMask;
use crate::domain::signing::MessageSigner;
use crate::domain::transaction::OutPoint;
use crate::foundation::{KeyId, MixError, SigningKeypair, TimestampMs, QUEUE_TTL_MS};
use serde::{Deserialize, Serialize};

/// "This coordinator accepts participants of this denomination."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixingQueueAnnouncement {
    pub relay: OutPoint,
    pub denomination_mask: DenominationMask,
    pub timestamp: TimestampMs,
    pub ready: bool,
    pub signature: Vec<u8>,
    /// Local bookkeeping; never sent.
    #[serde(skip)]
    pub consumed: bool,
}

impl MixingQueueAnnouncement {
    pub fn new(relay: OutPoint, denomination_mask: DenominationMask, timestamp: TimestampMs, ready: bool) -> Self {
        Self { relay, denomination_mask, timestamp, ready, signature: Vec::new(), consumed: false }
    }

    pub fn signing_message(&self) -> Vec<u8> {
        format!("{}{}{}{}", self.relay, self.denomination_mask, self.timestamp, u8::from(self.ready)).into_bytes()
    }

    pub fn sign(&mut self, messaging: &SigningKeypair) -> Result<(), MixError> {
        self.signature = MessageSigner::sign(&self.signing_message(), messaging)?;
        Ok(())
    }

    pub fn verify(&self, messaging_key: &KeyId) -> bool {
        MessageSigner::verify(&self.signing_message(), &self.signature, messaging_key)
    }

    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.is_expired_after(now, QUEUE_TTL_MS)
    }

    pub fn is_expired_after(&self, now: TimestampMs, ttl_ms: u64) -> bool {
        now.saturating_sub(self.timestamp) > ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::TxId;

    #[test]
    fn test_queue_announcement_expires_after_ttl() {
        let announcement = MixingQueueAnnouncement::new(OutPoint::new(TxId::new([1; 32]), 0), 1, 1_000, false);
        assert!(!announcement.is_expired(1_000 + QUEUE_TTL_MS));
        assert!(announcement.is_expired(1_001 + QUEUE_TTL_MS));
    }

    #[test]
    fn test_queue_signature_covers_ready_flag() {
        let key = SigningKeypair::from_secret_bytes([51; 32]).expect("key");
        let mut announcement = MixingQueueAnnouncement::new(OutPoint::new(TxId::new([1; 32]), 0), 8, 1, false);
        announcement.sign(&key).expect("sign");
        assert!(announcement.verify(&key.key_id()));
        announcement.ready = true;
        assert!(!announcement.verify(&key.key_id()));
    }
}
