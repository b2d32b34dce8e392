use crate::domain::transaction::{OutPoint, Transaction};
use crate::foundation::{MixError, COLLATERAL_MIN};

/// Fee burned by `tx`, or `None` when any input cannot be resolved.
pub fn collateral_fee(tx: &Transaction, resolve: impl Fn(&OutPoint) -> Option<u64>) -> Option<u64> {
    let mut value_in: u64 = 0;
    for input in &tx.inputs {
        value_in = value_in.checked_add(resolve(&input.prevout)?)?;
    }
    value_in.checked_sub(tx.total_out())
}

/// Structural half of collateral validation; standalone acceptability is checked by the caller.
pub fn check_collateral_shape(tx: &Transaction, resolve: impl Fn(&OutPoint) -> Option<u64>) -> Result<u64, MixError> {
    if tx.outputs.is_empty() || tx.inputs.is_empty() {
        return Err(MixError::CollateralInvalid);
    }
    match collateral_fee(tx, resolve) {
        Some(fee) if fee >= COLLATERAL_MIN => Ok(fee),
        _ => Err(MixError::CollateralInvalid),
    }
}
