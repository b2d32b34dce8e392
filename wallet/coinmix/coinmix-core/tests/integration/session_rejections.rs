use crate::fixtures::{pump, TestNetwork, TestPeer};
use coinmix_core::domain::{decompose_amount, EntryAcceptance, SessionState, Transaction, TxIn, TxOut};
use coinmix_core::foundation::{COLLATERAL_MIN, DENOMINATIONS};
use coinmix_core::infrastructure::transport::ProtocolMessage;
use coinmix_core::infrastructure::wallet::MemoryWallet;

fn entry_message(wallet: &MemoryWallet, collateral: Transaction) -> ProtocolMessage {
    let coin = wallet.fund(DENOMINATIONS[3], 1).expect("fund");
    let outputs: Vec<TxOut> = decompose_amount(DENOMINATIONS[3]).into_iter().map(|value| TxOut::new(value, wallet.script())).collect();
    ProtocolMessage::EntrySubmission { inputs: vec![TxIn::new(coin)], amount: DENOMINATIONS[3], collateral, outputs }
}

fn last_reply(peer: &TestPeer, to: &str) -> Option<(EntryAcceptance, String)> {
    peer.transport.sent_to(to).into_iter().rev().find_map(|message| match message {
        ProtocolMessage::StatusUpdate { accepted, message, .. } => Some((accepted, message)),
        _ => None,
    })
}

#[test]
fn low_fee_collateral_entry_is_rejected_and_slot_released() {
    let network = TestNetwork::new();
    let mut coordinator = network.coordinator(3, 3);
    let wallet = network.wallet(61);
    let handshake = ProtocolMessage::AmountHandshake { amount: DENOMINATIONS[3], collateral: network.good_collateral(&wallet) };
    coordinator.session.handle_message("joiner:61", handshake).expect("handshake");
    assert_eq!(coordinator.session.participant_count(), 1);

    let cheap = network.collateral(&wallet, COLLATERAL_MIN - 1);
    coordinator.session.handle_message("joiner:61", entry_message(&wallet, cheap)).expect("entry");

    assert_eq!(last_reply(&coordinator, "joiner:61"), Some((EntryAcceptance::Rejected, "collateral not valid".to_string())));
    assert_eq!(coordinator.session.participant_count(), 0);
    assert!(coordinator.session.entries().is_empty());
}

#[test]
fn idle_session_forfeits_the_unmatched_collateral() {
    let network = TestNetwork::new();
    let mut coordinator = network.coordinator(4, 3);
    let wallets: Vec<_> = (62..65).map(|seed| network.wallet(seed)).collect();
    let collaterals: Vec<_> = wallets.iter().map(|wallet| network.good_collateral(wallet)).collect();
    for (index, collateral) in collaterals.iter().enumerate() {
        let handshake = ProtocolMessage::AmountHandshake { amount: DENOMINATIONS[3], collateral: collateral.clone() };
        coordinator.session.handle_message(&format!("joiner:{}", index), handshake).expect("handshake");
    }
    coordinator.session.check().expect("tick");
    assert_eq!(coordinator.session.state(), SessionState::AcceptingEntries);
    for (index, wallet) in wallets.iter().enumerate().take(2) {
        let message = entry_message(wallet, collaterals[index].clone());
        coordinator.session.handle_message(&format!("joiner:{}", index), message).expect("entry");
    }
    assert_eq!(coordinator.session.entries_count(), 2);

    network.clock.advance_secs(31);
    coordinator.session.check_timeout().expect("timeout");

    assert_eq!(network.mempool.admitted(), vec![collaterals[2].clone()]);
    assert_eq!(coordinator.session.state(), SessionState::AcceptingEntries);
    assert_eq!(coordinator.session.participant_count(), 0);
    assert_eq!(coordinator.session.session_denomination(), 0);
    assert_eq!(coordinator.session.session_amount(), 0);
}

#[test]
fn participant_with_other_denomination_is_turned_away() {
    let network = TestNetwork::new();
    let mut peers = vec![network.coordinator(8, 3), network.participant(71, DENOMINATIONS[3]), network.participant(72, DENOMINATIONS[2])];
    peers[1].session.begin_session(network.coordinator_peer(), DENOMINATIONS[3]).expect("first");
    pump(&mut peers);
    peers[2].session.begin_session(network.coordinator_peer(), DENOMINATIONS[2]).expect("second");
    pump(&mut peers);

    assert_eq!(peers[0].session.participant_count(), 1);
    assert!(peers[1].session.has_found_coordinator());
    assert!(!peers[2].session.has_found_coordinator());
    assert!(peers[2].session.needs_retry());
    assert!(peers[2].wallet.locked_coins().is_empty());
    assert!(peers[2].session.collateral().is_none());
}
