use coinmix_core::domain::{assemble_unshuffled, build_draft, verify_own_outputs, EntryInput, OutPoint, ParticipantEntry, Transaction, TxIn, TxOut};
use coinmix_core::foundation::{MixError, TxId, DENOMINATIONS};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn entry(seed: u8) -> ParticipantEntry {
    let input = EntryInput::new(TxIn::new(OutPoint::new(TxId::new([seed; 32]), 0)), vec![seed]);
    let outputs = vec![TxOut::new(DENOMINATIONS[3], vec![seed, 1]), TxOut::new(DENOMINATIONS[3], vec![seed, 2])];
    ParticipantEntry::new(vec![input], outputs, 2 * DENOMINATIONS[3], Transaction::default(), 0)
}

#[test]
fn draft_keeps_every_output_and_input() {
    let entries: Vec<_> = (1..=3).map(entry).collect();
    let draft = build_draft(&entries, &mut StdRng::seed_from_u64(9));
    assert_eq!(draft.outputs.len(), 6);
    assert_eq!(draft.inputs.len(), 3);
    for entry in &entries {
        verify_own_outputs(&draft, &entry.outputs, entry.amount).expect("entry paid");
    }
}

#[test]
fn draft_order_is_permuted_for_some_seed() {
    let entries: Vec<_> = (1..=3).map(entry).collect();
    let submitted = assemble_unshuffled(&entries).outputs;
    let permuted = (0..16u64).any(|seed| build_draft(&entries, &mut StdRng::seed_from_u64(seed)).outputs != submitted);
    assert!(permuted);
}

#[test]
fn missing_output_is_refused() {
    let entries: Vec<_> = (1..=2).map(entry).collect();
    let mut draft = build_draft(&entries, &mut StdRng::seed_from_u64(1));
    draft.outputs.retain(|out| out.script_pubkey != vec![1, 2]);
    let err = verify_own_outputs(&draft, &entries[0].outputs, entries[0].amount).expect_err("refused");
    assert!(matches!(err, MixError::DraftMismatch(_)));
}

#[test]
fn declared_amount_must_match_outputs() {
    let entries = vec![entry(4)];
    let draft = assemble_unshuffled(&entries);
    assert!(verify_own_outputs(&draft, &entries[0].outputs, entries[0].amount + 1).is_err());
}
