//! How many mixing rounds a coin has already been through.

use crate::domain::denomination::is_denominated;
use crate::domain::transaction::{Transaction, TxIn};
use crate::foundation::{TxId, FEE_DENOMINATION, MAX_MIX_DEPTH};

pub const ROUNDS_OUT_OF_RANGE: i32 = -4;
pub const ROUNDS_FEE_PASS_THROUGH: i32 = -3;
pub const ROUNDS_NOT_DENOMINATED: i32 = -2;

/// Read-only view of the owner's transaction history.
pub trait MixHistory {
    fn transaction(&self, txid: &TxId) -> Option<Transaction>;
    fn is_mine(&self, input: &TxIn) -> bool;
}

/// Walks the chain of owned parent transactions backwards from `input`.
///
/// Returns `-4` for an out-of-range output index, `-3` when the coin is a fee-sized helper,
/// `-2` when the coin itself is not denominated, otherwise the depth reached. An unknown or
/// unowned parent yields `rounds - 1`.
pub fn input_mix_rounds<H: MixHistory + ?Sized>(history: &H, input: &TxIn) -> i32 {
    mix_rounds_at(history, input, 0)
}

fn mix_rounds_at<H: MixHistory + ?Sized>(history: &H, input: &TxIn, rounds: i32) -> i32 {
    if rounds >= MAX_MIX_DEPTH {
        return rounds;
    }
    let Some(tx) = history.transaction(&input.prevout.txid) else {
        return rounds - 1;
    };
    let Some(output) = tx.outputs.get(input.prevout.index as usize) else {
        return ROUNDS_OUT_OF_RANGE;
    };
    if output.value == FEE_DENOMINATION {
        return ROUNDS_FEE_PASS_THROUGH;
    }
    if rounds == 0 && !is_denominated(output.value) {
        return ROUNDS_NOT_DENOMINATED;
    }
    if !tx.outputs.iter().any(|out| is_denominated(out.value)) {
        return rounds;
    }
    for parent in tx.inputs.iter().filter(|parent| history.is_mine(parent)) {
        let depth = mix_rounds_at(history, parent, rounds + 1);
        if depth != ROUNDS_FEE_PASS_THROUGH {
            return depth;
        }
    }
    rounds - 1
}
