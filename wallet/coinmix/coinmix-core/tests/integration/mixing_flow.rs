use crate::fixtures::{pump, TestNetwork, TestPeer, TEST_CHAIN_HEIGHT};
use coinmix_core::application::SessionEvent;
use coinmix_core::domain::{denominations_of, SessionState, TxOut};
use coinmix_core::foundation::{COMPLETION_GRACE_MS, DENOMINATIONS, TERMINAL_DISPLAY_MS};

/// Coordinator first, then three participants joined for `amount` and the queue filled.
fn filled_session(network: &TestNetwork, seed: u64, amount: u64) -> Vec<TestPeer> {
    let mut peers = vec![network.coordinator(seed, 3)];
    for participant_seed in 11..=13 {
        let mut peer = network.participant(participant_seed, amount);
        peer.session.begin_session(network.coordinator_peer(), amount).expect("begin session");
        peers.push(peer);
    }
    pump(&mut peers);
    peers[0].session.check().expect("coordinator tick");
    pump(&mut peers);
    peers
}

fn submitted_outputs(coordinator: &TestPeer) -> Vec<TxOut> {
    coordinator.session.entries().iter().flat_map(|entry| entry.outputs.iter().cloned()).collect()
}

#[test]
fn three_participants_with_largest_tier_complete_a_mix() {
    let network = TestNetwork::new();
    let peers = filled_session(&network, 21, DENOMINATIONS[0]);
    let coordinator = &peers[0];

    assert!(network
        .observer
        .events()
        .iter()
        .any(|event| matches!(event, SessionEvent::StateChanged { to: SessionState::FinalizeTransaction, .. })));
    assert_eq!(coordinator.session.session_denomination(), 0b0001);
    assert_eq!(coordinator.session.entries_count(), 3);

    let final_tx = coordinator.session.final_transaction().cloned().expect("final transaction");
    let per_entry = coordinator.session.entries()[0].outputs.len();
    assert_eq!(final_tx.outputs.len(), 3 * per_entry);
    assert_eq!(denominations_of(&final_tx.outputs), 0b0001);
    assert!(final_tx.inputs.iter().all(|input| input.is_signed()));
    assert_eq!(coordinator.session.state(), SessionState::Transmission);
    assert_eq!(network.mempool.admitted(), vec![final_tx]);

    for participant in &peers[1..] {
        assert_eq!(participant.session.state(), SessionState::Success);
        assert_eq!(participant.session.last_success_block(), Some(TEST_CHAIN_HEIGHT));
        assert!(participant.session.locked_coins().is_empty());
        assert!(participant.wallet.locked_coins().is_empty());
    }
}

#[test]
fn draft_output_order_differs_from_submission_for_some_seed() {
    let permuted = (0..8u64).any(|seed| {
        let network = TestNetwork::new();
        let peers = filled_session(&network, seed, DENOMINATIONS[3]);
        let draft = peers[0].session.final_transaction().cloned().expect("draft");
        draft.outputs != submitted_outputs(&peers[0])
    });
    assert!(permuted);
}

#[test]
fn terminal_reset_leaves_no_locked_coins() {
    let network = TestNetwork::new();
    let mut peers = filled_session(&network, 5, DENOMINATIONS[3]);

    network.clock.advance_millis(TERMINAL_DISPLAY_MS.max(COMPLETION_GRACE_MS));
    for peer in peers.iter_mut() {
        peer.session.check().expect("tick");
    }

    for peer in &peers {
        assert_eq!(peer.session.state(), SessionState::AcceptingEntries);
        assert!(peer.session.locked_coins().is_empty());
        assert!(peer.wallet.locked_coins().is_empty());
        assert!(peer.session.entries().is_empty());
    }
}
