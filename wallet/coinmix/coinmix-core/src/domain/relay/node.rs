use crate::domain::transaction::OutPoint;
use crate::foundation::{TimestampMs, RELAY_EXPIRATION_MS, RELAY_REMOVAL_MS};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EligibilityState {
    #[default]
    PreEnabled,
    Enabled,
    Expired,
    PendingRemoval,
    CollateralSpent,
}

impl EligibilityState {
    /// `CollateralSpent` is never re-evaluated.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EligibilityState::CollateralSpent)
    }

    pub fn is_removable(&self) -> bool {
        matches!(self, EligibilityState::PendingRemoval | EligibilityState::CollateralSpent)
    }
}

/// A bonded relay node as tracked by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayNode {
    /// Identity: the input spending the node's bonded collateral.
    pub collateral: OutPoint,
    pub address: String,
    pub operator_key: PublicKey,
    pub messaging_key: PublicKey,
    pub signature: Vec<u8>,
    pub sig_time: TimestampMs,
    pub last_seen: TimestampMs,
    /// Signature time of the newest accepted ping.
    #[serde(default)]
    pub last_ping_time: TimestampMs,
    pub protocol_version: u32,
    pub state: EligibilityState,
}

impl RelayNode {
    pub fn is_enabled(&self) -> bool {
        self.state == EligibilityState::Enabled
    }
}

/// Next eligibility state for a node last seen at `last_seen`.
///
/// `collateral_acceptable` is only consulted when the node is otherwise current.
pub fn classify_liveness(
    current: EligibilityState,
    last_seen: TimestampMs,
    now: TimestampMs,
    collateral_acceptable: impl FnOnce() -> bool,
) -> EligibilityState {
    if current.is_terminal() {
        return current;
    }
    let idle = now.saturating_sub(last_seen);
    if idle >= RELAY_REMOVAL_MS {
        return EligibilityState::PendingRemoval;
    }
    if idle >= RELAY_EXPIRATION_MS {
        return EligibilityState::Expired;
    }
    if !collateral_acceptable() {
        return EligibilityState::CollateralSpent;
    }
    EligibilityState::Enabled
}
