//! Denomination masks: one bit per canonical tier, in `DENOMINATIONS` order.

use crate::domain::transaction::TxOut;
use crate::foundation::{DENOMINATIONS, MAX_OUTPUTS_PER_TIER};

pub type DenominationMask = u32;

pub fn is_denominated(value: u64) -> bool {
    DENOMINATIONS.contains(&value)
}

/// Bit `i` is set when at least one output carries exactly `DENOMINATIONS[i]`.
pub fn denominations_of(outputs: &[TxOut]) -> DenominationMask {
    DENOMINATIONS.iter().enumerate().fold(0, |mask, (bit, denom)| {
        if outputs.iter().any(|out| out.value == *denom) {
            mask | (1 << bit)
        } else {
            mask
        }
    })
}

/// Greedy decomposition of `amount` into canonical tiers, largest first, at most
/// `MAX_OUTPUTS_PER_TIER` outputs per tier. The remainder that fits no tier is left over.
pub fn decompose_amount(amount: u64) -> Vec<u64> {
    let mut left = amount;
    let mut values = Vec::new();
    for denom in DENOMINATIONS {
        let mut count = 0;
        while left >= denom && count < MAX_OUTPUTS_PER_TIER {
            values.push(denom);
            left -= denom;
            count += 1;
        }
    }
    values
}

pub fn denominations_by_amount(amount: u64) -> DenominationMask {
    let outputs: Vec<TxOut> = decompose_amount(amount).into_iter().map(|value| TxOut::new(value, Vec::new())).collect();
    denominations_of(&outputs)
}

/// Exact tier presence, not value equality.
pub fn masks_compatible(a: DenominationMask, b: DenominationMask) -> bool {
    a == b
}

pub fn amounts_compatible(a: u64, b: u64) -> bool {
    masks_compatible(denominations_by_amount(a), denominations_by_amount(b))
}
