//! Minimal UTXO transaction model shared by sessions, collateral checks and the election code.

use crate::domain::hashes;
use crate::foundation::{KeyId, MixError, TxId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Leading byte of a pay-to-key-id output script.
pub const PAY_TO_KEY_TAG: u8 = 0xc1;
pub const PAY_TO_KEY_SCRIPT_LEN: usize = 33;

/// Default input sequence.
pub const SEQUENCE_FINAL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub index: u32,
}

impl OutPoint {
    pub const fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }

    pub fn null() -> Self {
        Self { txid: TxId::default(), index: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl FromStr for OutPoint {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s.trim().rsplit_once(':').ok_or_else(|| MixError::EncodingError(format!("outpoint must be txid:index, got {}", s)))?;
        let index = index.parse::<u32>().map_err(|err| MixError::EncodingError(format!("outpoint index: {}", err)))?;
        Ok(Self::new(txid.parse()?, index))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        Self { prevout, script_sig: Vec::new(), sequence: SEQUENCE_FINAL }
    }

    pub fn is_signed(&self) -> bool {
        !self.script_sig.is_empty()
    }

    /// Same coin reference, ignoring any attached signature.
    pub fn same_reference(&self, other: &TxIn) -> bool {
        self.prevout == other.prevout && self.sequence == other.sequence
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        Self { value, script_pubkey }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self { version: 1, inputs, outputs, lock_time: 0 }
    }

    pub fn txid(&self) -> TxId {
        hashes::transaction_id(self)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn total_out(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    pub fn input_position(&self, prevout: &OutPoint) -> Option<usize> {
        self.inputs.iter().position(|input| &input.prevout == prevout)
    }
}

/// Locks an output to the holder of the key with the given identity.
pub fn pay_to_key_script(key: &KeyId) -> Vec<u8> {
    let mut script = Vec::with_capacity(PAY_TO_KEY_SCRIPT_LEN);
    script.push(PAY_TO_KEY_TAG);
    script.extend_from_slice(key.as_hash());
    script
}

pub fn extract_pay_to_key(script: &[u8]) -> Option<KeyId> {
    if script.len() != PAY_TO_KEY_SCRIPT_LEN || script[0] != PAY_TO_KEY_TAG {
        return None;
    }
    let bytes: [u8; 32] = script[1..].try_into().ok()?;
    Some(KeyId::new(bytes))
}
