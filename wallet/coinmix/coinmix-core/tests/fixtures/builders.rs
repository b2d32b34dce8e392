#![allow(dead_code)]

use crate::fixtures::{
    TEST_CHAIN_HEIGHT, TEST_COORDINATOR_ADDRESS, TEST_COORDINATOR_WALLET_SEED, TEST_MESSAGING_SEED, TEST_OPERATOR_SEED, TEST_PUMP_ROUNDS,
    TEST_START_MILLIS,
};
use coinmix_core::application::{
    CoordinatorPeer, MixingQueueBroadcaster, MixingSession, RecordingObserver, RelayNodeRegistry, SessionConfig, SessionContext,
};
use coinmix_core::domain::{pay_to_key_script, OutPoint, RelayAnnouncement, Transaction, TxIn, TxOut};
use coinmix_core::foundation::util::time::{Clock, ManualClock};
use coinmix_core::foundation::{SigningKeypair, TxId, COIN, COLLATERAL_MIN, RELAY_COLLATERAL};
use coinmix_core::infrastructure::chain::MemoryChain;
use coinmix_core::infrastructure::mempool::MemoryMempool;
use coinmix_core::infrastructure::transport::RecordingTransport;
use coinmix_core::infrastructure::wallet::MemoryWallet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Shared chain, mempool, clock and registry with one registered relay node.
pub struct TestNetwork {
    pub chain: Arc<MemoryChain>,
    pub mempool: Arc<MemoryMempool>,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<RelayNodeRegistry>,
    pub observer: Arc<RecordingObserver>,
    pub relay: OutPoint,
    pub messaging: SigningKeypair,
}

/// One node on the simulated network with its own transport and queue view.
pub struct TestPeer {
    pub address: String,
    pub wallet: Arc<MemoryWallet>,
    pub transport: Arc<RecordingTransport>,
    pub session: MixingSession,
}

impl TestNetwork {
    pub fn new() -> Self {
        let chain = Arc::new(MemoryChain::with_height(TEST_CHAIN_HEIGHT));
        let mempool = Arc::new(MemoryMempool::new(chain.clone()));
        let clock = Arc::new(ManualClock::new(TEST_START_MILLIS));
        let registry = Arc::new(RelayNodeRegistry::new(chain.clone(), mempool.clone(), clock.clone()));
        let messaging = SigningKeypair::from_secret_bytes([TEST_MESSAGING_SEED; 32]).expect("messaging key");
        let mut network = Self {
            chain,
            mempool,
            clock,
            registry,
            observer: Arc::new(RecordingObserver::new()),
            relay: OutPoint::null(),
            messaging: messaging.clone(),
        };
        network.relay = network.register_relay(TEST_OPERATOR_SEED, &messaging, TEST_COORDINATOR_ADDRESS);
        network
    }

    /// Fund a bonded collateral deep in the chain and admit its signed announcement.
    pub fn register_relay(&self, operator_seed: u8, messaging: &SigningKeypair, address: &str) -> OutPoint {
        let operator = SigningKeypair::from_secret_bytes([operator_seed; 32]).expect("operator key");
        let funding = Transaction::new(
            vec![TxIn::new(OutPoint::new(TxId::new([operator_seed; 32]), 0))],
            vec![TxOut::new(RELAY_COLLATERAL, pay_to_key_script(&operator.key_id()))],
        );
        let collateral = OutPoint::new(self.chain.add_transaction(funding, Some(20)), 0);
        let announcement =
            RelayAnnouncement::signed(collateral, address, &operator, messaging.public_key(), self.clock.now_millis()).expect("sign announcement");
        self.registry.accept_announcement(announcement).expect("register relay");
        collateral
    }

    pub fn wallet(&self, seed: u8) -> Arc<MemoryWallet> {
        Arc::new(MemoryWallet::new(SigningKeypair::from_secret_bytes([seed; 32]).expect("wallet key"), self.chain.clone(), 2))
    }

    pub fn context(&self, wallet: Arc<MemoryWallet>, transport: Arc<RecordingTransport>) -> SessionContext {
        let queue = Arc::new(MixingQueueBroadcaster::new(self.registry.clone(), transport.clone(), self.clock.clone()));
        SessionContext {
            chain: self.chain.clone(),
            mempool: self.mempool.clone(),
            wallet,
            transport,
            registry: self.registry.clone(),
            queue,
            clock: self.clock.clone(),
            observer: self.observer.clone(),
        }
    }

    pub fn coordinator(&self, seed: u64, participant_cap: usize) -> TestPeer {
        let wallet = self.wallet(TEST_COORDINATOR_WALLET_SEED);
        let transport = Arc::new(RecordingTransport::new());
        let config = SessionConfig { participant_cap, ..SessionConfig::default() };
        let session = MixingSession::coordinator_with_rng(
            self.context(wallet.clone(), transport.clone()),
            config,
            self.relay,
            self.messaging.clone(),
            StdRng::seed_from_u64(seed),
        );
        TestPeer { address: TEST_COORDINATOR_ADDRESS.to_string(), wallet, transport, session }
    }

    /// Participant holding one coin of `coin_value` plus a collateral-sized coin.
    pub fn participant(&self, seed: u8, coin_value: u64) -> TestPeer {
        let wallet = self.wallet(seed);
        wallet.fund(coin_value, 0).expect("fund mixing coin");
        wallet.fund(COIN / 5, 0).expect("fund collateral coin");
        let transport = Arc::new(RecordingTransport::new());
        let session = MixingSession::participant(self.context(wallet.clone(), transport.clone()), SessionConfig::default());
        TestPeer { address: format!("participant:{}", seed), wallet, transport, session }
    }

    pub fn coordinator_peer(&self) -> CoordinatorPeer {
        CoordinatorPeer { relay: self.relay, address: TEST_COORDINATOR_ADDRESS.to_string() }
    }

    /// Collateral spending a fresh coin of `wallet` and burning `fee`.
    pub fn collateral(&self, wallet: &MemoryWallet, fee: u64) -> Transaction {
        let coin = wallet.fund(COIN / 5, 0).expect("fund collateral");
        Transaction::new(vec![TxIn::new(coin)], vec![TxOut::new(COIN / 5 - fee, wallet.script())])
    }

    pub fn good_collateral(&self, wallet: &MemoryWallet) -> Transaction {
        self.collateral(wallet, COLLATERAL_MIN)
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver recorded traffic between peers until everyone is quiet. Directed messages go to
/// the named peer, broadcasts to every other peer. Returns the number of deliveries.
pub fn pump(peers: &mut [TestPeer]) -> usize {
    let mut delivered = 0;
    for _ in 0..TEST_PUMP_ROUNDS {
        let mut outbox = Vec::new();
        for peer in peers.iter() {
            let (sent, broadcasts) = peer.transport.take();
            outbox.extend(sent.into_iter().map(|(to, message)| (peer.address.clone(), Some(to), message)));
            outbox.extend(broadcasts.into_iter().map(|message| (peer.address.clone(), None, message)));
        }
        if outbox.is_empty() {
            break;
        }
        for (from, to, message) in outbox {
            for peer in peers.iter_mut() {
                let addressed = match &to {
                    Some(to) => to == &peer.address,
                    None => peer.address != from,
                };
                if addressed {
                    peer.session.handle_message(&from, message.clone()).expect("deliver message");
                    delivered += 1;
                }
            }
        }
    }
    delivered
}
