use coinmix_core::domain::{decompose_amount, denominations_by_amount, denominations_of, TxOut};
use coinmix_core::foundation::{COIN, DENOMINATIONS, MAX_OUTPUTS_PER_TIER, MAX_POOL_AMOUNT};
use proptest::prelude::*;

fn output_value() -> impl Strategy<Value = u64> {
    prop_oneof![
        prop::sample::select(DENOMINATIONS.to_vec()),
        1u64..=(20 * COIN),
    ]
}

fn outputs(values: &[u64]) -> Vec<TxOut> {
    values.iter().map(|value| TxOut::new(*value, Vec::new())).collect()
}

proptest! {
    #[test]
    fn prop_denominations_of_ignores_output_order(
        (original, shuffled) in prop::collection::vec(output_value(), 0..12)
            .prop_flat_map(|values| (Just(values.clone()), Just(values).prop_shuffle()))
    ) {
        prop_assert_eq!(denominations_of(&outputs(&original)), denominations_of(&outputs(&shuffled)));
    }

    #[test]
    fn prop_decomposition_caps_outputs_per_tier(amount in 0u64..=(4 * MAX_POOL_AMOUNT)) {
        let values = decompose_amount(amount);
        for denom in DENOMINATIONS {
            prop_assert!(values.iter().filter(|value| **value == denom).count() <= MAX_OUTPUTS_PER_TIER);
        }
        prop_assert!(values.iter().sum::<u64>() <= amount);
    }

    #[test]
    fn prop_mask_survives_recomposition(amount in 0u64..=(2 * MAX_POOL_AMOUNT)) {
        let mask = denominations_by_amount(amount);
        let recomposed: u64 = decompose_amount(amount).iter().sum();
        prop_assert_eq!(denominations_by_amount(recomposed), mask);
        prop_assert_eq!(denominations_of(&outputs(&decompose_amount(recomposed))), mask);
    }
}

#[test]
fn largest_tier_alone_sets_lowest_bit() {
    assert_eq!(denominations_by_amount(DENOMINATIONS[0]), 0b0001);
    assert_eq!(denominations_by_amount(DENOMINATIONS[3]), 0b1000);
    assert_eq!(denominations_by_amount(DENOMINATIONS[1] + DENOMINATIONS[3]), 0b1010);
}

#[test]
fn amount_below_smallest_tier_has_no_mask() {
    assert_eq!(denominations_by_amount(COIN), 0);
    assert!(decompose_amount(COIN).is_empty());
}
