use coinmix_core::domain::{election_score, election_score_32, reference_checkpoint_height, OutPoint};
use coinmix_core::foundation::{BlockHash, TxId};

#[test]
fn election_score_compares_low_32_bits() {
    let collateral = OutPoint::new(TxId::new([7; 32]), 1);
    let reference = BlockHash::new([9; 32]);
    let full = election_score(&collateral, &reference);
    assert_eq!(u64::from(election_score_32(&collateral, &reference)), full.low_u64() & 0xffff_ffff);
}

#[test]
fn checkpoint_height_steps_back_per_block_of_lead() {
    assert_eq!(reference_checkpoint_height(200, 10, None), Some(200));
    assert_eq!(reference_checkpoint_height(205, 10, None), Some(200));
    assert_eq!(reference_checkpoint_height(205, 10, Some(207)), Some(190));
    assert_eq!(reference_checkpoint_height(5, 10, None), None);
    assert_eq!(reference_checkpoint_height(200, 0, None), None);
}
