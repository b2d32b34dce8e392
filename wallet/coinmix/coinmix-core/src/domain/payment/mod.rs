use crate::domain::signing::MessageSigner;
use crate::domain::transaction::OutPoint;
use crate::foundation::{KeyId, MixError, SigningKeypair, PAYMENT_ROTATION_PERCENT};
use serde::{Deserialize, Serialize};

/// Elected payee for one block height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentWinner {
    pub height: u64,
    pub collateral: OutPoint,
    pub score: u64,
    pub signature: Vec<u8>,
}

impl PaymentWinner {
    pub fn new(height: u64, collateral: OutPoint, score: u64) -> Self {
        Self { height, collateral, score, signature: Vec::new() }
    }

    /// Identity and height; the score is recomputed by every receiver and not signed.
    pub fn signing_message(&self) -> Vec<u8> {
        format!("{}{}", self.collateral, self.height).into_bytes()
    }

    pub fn sign(&mut self, authority: &SigningKeypair) -> Result<(), MixError> {
        self.signature = MessageSigner::sign(&self.signing_message(), authority)?;
        Ok(())
    }

    pub fn verify(&self, authority: &KeyId) -> bool {
        MessageSigner::verify(&self.signing_message(), &self.signature, authority)
    }
}

/// A node qualifies for payment when its blocks since last payment reach the rotation share
/// of the node count.
pub fn passes_rotation(blocks_since_payment: u64, node_count: usize) -> bool {
    u128::from(blocks_since_payment) * 100 >= u128::from(PAYMENT_ROTATION_PERCENT) * node_count as u128
}
