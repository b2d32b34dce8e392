use crate::fixtures::{TestNetwork, TEST_AUTHORITY_SEED};
use coinmix_core::application::{
    MixingNode, MixingQueueBroadcaster, MixingSession, PaymentWinnerLedger, RelayNodeRegistry, SessionConfig, SessionContext,
};
use coinmix_core::foundation::SigningKeypair;
use coinmix_core::infrastructure::transport::{ProtocolMessage, RecordingTransport};
use std::sync::Arc;

struct GossipNode {
    node: MixingNode,
    registry: Arc<RelayNodeRegistry>,
    transport: Arc<RecordingTransport>,
}

fn authority() -> SigningKeypair {
    SigningKeypair::from_secret_bytes([TEST_AUTHORITY_SEED; 32]).expect("authority")
}

/// Node with its own registry, seeded from the network's only when `with_relay` is set.
fn gossip_node(network: &TestNetwork, wallet_seed: u8, with_relay: bool, signer: Option<SigningKeypair>) -> GossipNode {
    let transport = Arc::new(RecordingTransport::new());
    let registry = if with_relay {
        network.registry.clone()
    } else {
        Arc::new(RelayNodeRegistry::new(network.chain.clone(), network.mempool.clone(), network.clock.clone()))
    };
    let ctx = SessionContext {
        chain: network.chain.clone(),
        mempool: network.mempool.clone(),
        wallet: network.wallet(wallet_seed),
        transport: transport.clone(),
        registry: registry.clone(),
        queue: Arc::new(MixingQueueBroadcaster::new(registry.clone(), transport.clone(), network.clock.clone())),
        clock: network.clock.clone(),
        observer: network.observer.clone(),
    };
    let mut ledger = PaymentWinnerLedger::new(registry.clone(), network.chain.clone(), transport.clone(), authority().key_id());
    if let Some(signer) = signer {
        ledger = ledger.with_signer(signer).expect("signer");
    }
    let session = MixingSession::participant(ctx, SessionConfig::default());
    GossipNode { node: MixingNode::new(Arc::new(ledger), session), registry, transport }
}

#[test]
fn fresh_node_learns_registry_through_startup_sync() {
    let network = TestNetwork::new();
    let seeded = gossip_node(&network, 31, true, None);
    let fresh = gossip_node(&network, 32, false, None);
    assert!(fresh.registry.is_empty());

    for tick in 1..=5 {
        fresh.node.on_tick(tick).expect("tick");
    }
    let (_, broadcasts) = fresh.transport.take();
    let request = broadcasts
        .into_iter()
        .find(|message| matches!(message, ProtocolMessage::RegistrySyncRequest { .. }))
        .expect("sync request");

    seeded.node.dispatch("node:fresh", request).expect("serve sync");
    for (peer, message) in seeded.transport.take().0 {
        assert_eq!(peer, "node:fresh");
        fresh.node.dispatch("node:seeded", message).expect("apply announcement");
    }

    assert_eq!(fresh.registry.enabled_count(), 1);
    assert!(fresh.registry.get(&network.relay).is_some());
}

#[test]
fn signed_payment_vote_propagates_to_peers() {
    let network = TestNetwork::new();
    network.chain.extend_to(700);
    let voter = gossip_node(&network, 33, true, Some(authority()));
    let listener = gossip_node(&network, 34, true, None);

    voter.node.on_new_block(700).expect("vote");
    let winner = voter.node.ledger().winner_at(710).expect("vote recorded");
    assert_eq!(winner.collateral, network.relay);

    for message in voter.transport.take().1 {
        listener.node.dispatch("node:voter", message).expect("deliver");
    }
    assert_eq!(listener.node.ledger().winner_at(710), Some(winner.clone()));
    assert!(listener.transport.broadcasts().contains(&ProtocolMessage::PaymentWinner(winner)));
}

#[test]
fn forged_payment_vote_is_dropped() {
    let network = TestNetwork::new();
    network.chain.extend_to(700);
    let listener = gossip_node(&network, 35, true, None);
    let mut forged = coinmix_core::domain::PaymentWinner::new(710, network.relay, 1);
    forged.sign(&SigningKeypair::from_secret_bytes([99; 32]).expect("key")).expect("sign");

    listener.node.dispatch("node:liar", ProtocolMessage::PaymentWinner(forged)).expect("dispatch");
    assert!(listener.node.ledger().is_empty());
    assert!(listener.transport.broadcasts().is_empty());
}
