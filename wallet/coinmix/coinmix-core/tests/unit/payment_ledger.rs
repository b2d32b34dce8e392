use crate::fixtures::{TestNetwork, TEST_AUTHORITY_SEED, TEST_CHAIN_HEIGHT};
use coinmix_core::application::PaymentWinnerLedger;
use coinmix_core::domain::{OutPoint, PaymentWinner};
use coinmix_core::foundation::{SigningKeypair, TxId, PAYMENT_MATURITY_OFFSET};
use coinmix_core::infrastructure::transport::RecordingTransport;
use std::sync::Arc;

fn ledger(network: &TestNetwork) -> PaymentWinnerLedger {
    let authority = SigningKeypair::from_secret_bytes([TEST_AUTHORITY_SEED; 32]).expect("authority");
    PaymentWinnerLedger::new(network.registry.clone(), network.chain.clone(), Arc::new(RecordingTransport::new()), authority.key_id())
}

#[test]
fn higher_score_wins_regardless_of_arrival_order() {
    let network = TestNetwork::new();
    let low = PaymentWinner::new(250, OutPoint::new(TxId::new([1; 32]), 0), 5);
    let high = PaymentWinner::new(250, OutPoint::new(TxId::new([2; 32]), 0), 9);

    for order in [[low.clone(), high.clone()], [high.clone(), low.clone()]] {
        let ledger = ledger(&network);
        for winner in order {
            ledger.record(winner).expect("record");
        }
        assert_eq!(ledger.winner_at(250).map(|winner| winner.score), Some(9));
        assert_eq!(ledger.len(), 1);
    }
}

#[test]
fn recently_paid_node_is_not_elected() {
    let network = TestNetwork::new();
    let ledger = ledger(&network);
    let target = TEST_CHAIN_HEIGHT + PAYMENT_MATURITY_OFFSET - 10;

    let elected = ledger.compute_winner(target).expect("compute").expect("candidate");
    assert_eq!(elected.collateral, network.relay);

    ledger.record(PaymentWinner::new(TEST_CHAIN_HEIGHT, network.relay, 1)).expect("record");
    assert_eq!(ledger.compute_winner(target).expect("compute"), None);
}

#[test]
fn prune_drops_entries_below_depth() {
    let network = TestNetwork::new();
    let ledger = ledger(&network);
    for height in [190, 195, 200, 210] {
        ledger.record(PaymentWinner::new(height, network.relay, height)).expect("record");
    }
    assert_eq!(ledger.prune(TEST_CHAIN_HEIGHT).expect("prune"), 2);
    assert!(ledger.winner_at(190).is_none());
    assert!(ledger.winner_at(210).is_some());
}
