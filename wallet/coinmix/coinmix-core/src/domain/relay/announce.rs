//! Signed relay node self-announcements and pings.

use crate::domain::relay::node::{EligibilityState, RelayNode};
use crate::domain::signing::MessageSigner;
use crate::domain::transaction::OutPoint;
use crate::foundation::{key_id, MixError, SigningKeypair, TimestampMs};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

pub const RELAY_PROTOCOL_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAnnouncement {
    pub collateral: OutPoint,
    pub address: String,
    pub operator_key: PublicKey,
    pub messaging_key: PublicKey,
    pub sig_time: TimestampMs,
    pub protocol_version: u32,
    pub signature: Vec<u8>,
}

impl RelayAnnouncement {
    /// Build and sign with the operator (collateral-owning) key.
    pub fn signed(
        collateral: OutPoint,
        address: impl Into<String>,
        operator: &SigningKeypair,
        messaging_key: PublicKey,
        sig_time: TimestampMs,
    ) -> Result<Self, MixError> {
        let mut announcement = Self {
            collateral,
            address: address.into(),
            operator_key: operator.public_key(),
            messaging_key,
            sig_time,
            protocol_version: RELAY_PROTOCOL_VERSION,
            signature: Vec::new(),
        };
        announcement.signature = MessageSigner::sign(&announcement.signing_message(), operator)?;
        Ok(announcement)
    }

    pub fn signing_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.address.len() + 8 + 33 + 33 + 4);
        out.extend_from_slice(self.address.as_bytes());
        out.extend_from_slice(&self.sig_time.to_le_bytes());
        out.extend_from_slice(&self.operator_key.serialize());
        out.extend_from_slice(&self.messaging_key.serialize());
        out.extend_from_slice(&self.protocol_version.to_le_bytes());
        out
    }

    pub fn verify_signature(&self) -> bool {
        MessageSigner::verify(&self.signing_message(), &self.signature, &key_id(&self.operator_key))
    }

    pub fn into_node(self, now: TimestampMs) -> RelayNode {
        RelayNode {
            collateral: self.collateral,
            address: self.address,
            operator_key: self.operator_key,
            messaging_key: self.messaging_key,
            signature: self.signature,
            sig_time: self.sig_time,
            last_seen: now,
            last_ping_time: 0,
            protocol_version: self.protocol_version,
            state: EligibilityState::PreEnabled,
        }
    }

    pub fn from_node(node: &RelayNode) -> Self {
        Self {
            collateral: node.collateral,
            address: node.address.clone(),
            operator_key: node.operator_key,
            messaging_key: node.messaging_key,
            sig_time: node.sig_time,
            protocol_version: node.protocol_version,
            signature: node.signature.clone(),
        }
    }
}

/// Liveness refresh signed by the node's messaging key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPing {
    pub collateral: OutPoint,
    pub sig_time: TimestampMs,
    pub signature: Vec<u8>,
}

impl RelayPing {
    pub fn signed(collateral: OutPoint, messaging: &SigningKeypair, sig_time: TimestampMs) -> Result<Self, MixError> {
        let mut ping = Self { collateral, sig_time, signature: Vec::new() };
        ping.signature = MessageSigner::sign(&ping.signing_message(), messaging)?;
        Ok(ping)
    }

    pub fn signing_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(48);
        out.extend_from_slice(self.collateral.txid.as_hash());
        out.extend_from_slice(&self.collateral.index.to_le_bytes());
        out.extend_from_slice(&self.sig_time.to_le_bytes());
        out
    }

    pub fn verify_signature(&self, messaging_key: &PublicKey) -> bool {
        MessageSigner::verify(&self.signing_message(), &self.signature, &key_id(messaging_key))
    }
}
