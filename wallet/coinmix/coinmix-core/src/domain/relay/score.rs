//! Election scores.
//!
//! A score is the absolute difference of two 256-bit values read little-endian. Comparisons
//! use a fixed-width prefix of that difference: the low 32 bits for coordinator election and
//! the low 64 bits for payment election. The truncation width is part of the protocol.

use crate::domain::hashes::{score_identity, score_reference};
use crate::domain::transaction::OutPoint;
use crate::foundation::{BlockHash, Hash32};
use primitive_types::U256;

pub fn abs_diff(a: &Hash32, b: &Hash32) -> U256 {
    let a = U256::from_little_endian(a);
    let b = U256::from_little_endian(b);
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Full-width coordinator election score of a node against a reference block.
pub fn election_score(collateral: &OutPoint, reference: &BlockHash) -> U256 {
    abs_diff(collateral.txid.as_hash(), &score_reference(reference))
}

/// Low 32 bits, as compared by leader selection and ranking.
pub fn truncate_score_32(score: U256) -> u32 {
    score.low_u32()
}

/// Low 64 bits, as compared by payment election.
pub fn truncate_score_64(score: U256) -> u64 {
    score.low_u64()
}

pub fn election_score_32(collateral: &OutPoint, reference: &BlockHash) -> u32 {
    truncate_score_32(election_score(collateral, reference))
}

/// Payment election score against the block at the maturity offset.
pub fn payment_score(collateral: &OutPoint, reference: &BlockHash) -> u64 {
    truncate_score_64(abs_diff(&score_identity(collateral), &score_reference(reference)))
}

/// Height of the checkpoint block used as election reference.
///
/// Checkpoints are heights divisible by `modulus`, scanning back from `best_height`. With a
/// `target_height` past the tip, one checkpoint further back is taken per block of lead.
/// Height zero never qualifies.
pub fn reference_checkpoint_height(best_height: u64, modulus: u64, target_height: Option<u64>) -> Option<u64> {
    if modulus == 0 || best_height == 0 {
        return None;
    }
    let blocks_ago = target_height.map(|target| target.saturating_sub(best_height + 1)).unwrap_or(0);
    let latest = best_height - best_height % modulus;
    let back = blocks_ago.checked_mul(modulus)?;
    let height = latest.checked_sub(back)?;
    (height > 0).then_some(height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::TxId;

    #[test]
    fn test_abs_diff_is_symmetric() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[0] = 10;
        b[0] = 3;
        assert_eq!(abs_diff(&a, &b), U256::from(7u64));
        assert_eq!(abs_diff(&b, &a), U256::from(7u64));
    }

    #[test]
    fn test_truncation_takes_low_little_endian_bytes() {
        let mut a = [0u8; 32];
        a[0] = 0x01;
        a[1] = 0x02;
        a[4] = 0xff;
        a[31] = 0x80;
        let value = abs_diff(&a, &[0u8; 32]);
        assert_eq!(truncate_score_32(value), 0x0201);
        assert_eq!(truncate_score_64(value), 0xff_0000_0201);
    }

    #[test]
    fn test_reference_checkpoint_height() {
        assert_eq!(reference_checkpoint_height(107, 10, None), Some(100));
        assert_eq!(reference_checkpoint_height(107, 1, None), Some(107));
        assert_eq!(reference_checkpoint_height(107, 10, Some(108)), Some(100));
        assert_eq!(reference_checkpoint_height(107, 10, Some(110)), Some(80));
        assert_eq!(reference_checkpoint_height(7, 10, None), None);
        assert_eq!(reference_checkpoint_height(0, 1, None), None);
    }

    #[test]
    fn test_scores_are_deterministic_per_identity() {
        let node = OutPoint::new(TxId::new([4; 32]), 0);
        let other = OutPoint::new(TxId::new([5; 32]), 0);
        let block = BlockHash::new([6; 32]);
        assert_eq!(election_score(&node, &block), election_score(&node, &block));
        assert_ne!(payment_score(&node, &block), payment_score(&other, &block));
    }
}
