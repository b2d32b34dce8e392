//! Node-level message routing and the once-a-second maintenance loop.

use crate::application::driver::AutoMixDriver;
use crate::application::payments::PaymentWinnerLedger;
use crate::application::session::{MixingSession, SessionContext};
use crate::domain::relay::RelayPing;
use crate::domain::transaction::OutPoint;
use crate::foundation::{MixError, SigningKeypair, PAYMENT_VOTE_LEAD, UNLOCK_EVERY_BLOCKS};
use crate::infrastructure::transport::ProtocolMessage;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Registry liveness, ledger pruning, pings and auto-mix run on this cadence.
const SLOW_CADENCE_TICKS: u64 = 60;
const SYNC_CADENCE_TICKS: u64 = 5;
/// Startup sync asks for the relay list first, then the payment ledger.
const STARTUP_SYNC_ROUNDS: u32 = 2;

/// Identity a relay node pings with.
#[derive(Clone)]
pub struct RelayIdentity {
    pub collateral: OutPoint,
    pub messaging: SigningKeypair,
    pub ping_interval_ms: u64,
}

/// One node: the session it runs, the shared registry/ledger and the optional auto-mix driver.
pub struct MixingNode {
    ctx: SessionContext,
    ledger: Arc<PaymentWinnerLedger>,
    session: Mutex<MixingSession>,
    driver: Mutex<Option<AutoMixDriver>>,
    relay: Option<RelayIdentity>,
    last_ping: AtomicU64,
    last_height: Mutex<Option<u64>>,
    sync_rounds: AtomicU32,
}

impl MixingNode {
    pub fn new(ledger: Arc<PaymentWinnerLedger>, session: MixingSession) -> Self {
        Self {
            ctx: session.context().clone(),
            ledger,
            session: Mutex::new(session),
            driver: Mutex::new(None),
            relay: None,
            last_ping: AtomicU64::new(0),
            last_height: Mutex::new(None),
            sync_rounds: AtomicU32::new(0),
        }
    }

    pub fn with_driver(self, driver: AutoMixDriver) -> Self {
        Self { driver: Mutex::new(Some(driver)), ..self }
    }

    pub fn with_relay_identity(self, relay: RelayIdentity) -> Self {
        Self { relay: Some(relay), ..self }
    }

    pub fn ledger(&self) -> &Arc<PaymentWinnerLedger> {
        &self.ledger
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn session(&self) -> Result<MutexGuard<'_, MixingSession>, MixError> {
        self.session.lock().map_err(|_| crate::storage_err!("mixing_node session", "poisoned"))
    }

    fn driver(&self) -> Result<MutexGuard<'_, Option<AutoMixDriver>>, MixError> {
        self.driver.lock().map_err(|_| crate::storage_err!("mixing_node driver", "poisoned"))
    }

    /// Route one inbound message. Gossip that fails validation is dropped and logged.
    pub fn dispatch(&self, from: &str, message: ProtocolMessage) -> Result<(), MixError> {
        trace!("node message from={} message_type={}", from, message.message_type());
        match message {
            ProtocolMessage::RelayAnnouncement(announcement) => match self.ctx.registry.accept_announcement(announcement.clone()) {
                Ok(true) => self.ctx.transport.broadcast(ProtocolMessage::RelayAnnouncement(announcement)),
                Ok(false) => Ok(()),
                Err(err) => {
                    debug!("relay announcement dropped from={} error={}", from, err);
                    Ok(())
                }
            },
            ProtocolMessage::RelayPing(ping) => match self.ctx.registry.accept_ping(&ping) {
                Ok(true) => self.ctx.transport.broadcast(ProtocolMessage::RelayPing(ping)),
                Ok(false) => Ok(()),
                Err(err) => {
                    debug!("relay ping dropped from={} error={}", from, err);
                    Ok(())
                }
            },
            ProtocolMessage::RegistrySyncRequest { collateral } => {
                let announcements = self.ctx.registry.sync_announcements(from, collateral.as_ref())?;
                debug!("registry sync served peer={} count={}", from, announcements.len());
                for announcement in announcements {
                    self.ctx.transport.send(from, ProtocolMessage::RelayAnnouncement(announcement))?;
                }
                Ok(())
            }
            ProtocolMessage::PaymentWinner(winner) => match self.ledger.submit(winner.clone()) {
                Ok(true) => self.ctx.transport.broadcast(ProtocolMessage::PaymentWinner(winner)),
                Ok(false) => Ok(()),
                Err(err) => {
                    debug!("payment winner dropped from={} height={} error={}", from, winner.height, err);
                    Ok(())
                }
            },
            ProtocolMessage::PaymentSyncRequest => {
                let winners = self.ledger.sync_entries(from)?;
                debug!("payment sync served peer={} count={}", from, winners.len());
                for winner in winners {
                    self.ctx.transport.send(from, ProtocolMessage::PaymentWinner(winner))?;
                }
                Ok(())
            }
            session_message => self.session()?.handle_message(from, session_message),
        }
    }

    /// New best block: vote ahead of the tip and periodically release stray coin locks.
    pub fn on_new_block(&self, height: u64) -> Result<(), MixError> {
        debug!("new block height={}", height);
        if let Err(err) = self.ledger.process_block(height.saturating_add(PAYMENT_VOTE_LEAD)) {
            warn!("payment vote failed height={} error={}", height, err);
        }
        let mut session = self.session()?;
        if !session.is_coordinator() && height % UNLOCK_EVERY_BLOCKS == 0 {
            session.unlock_coins();
        }
        Ok(())
    }

    /// One maintenance tick; `tick` counts from 1.
    pub fn on_tick(&self, tick: u64) -> Result<(), MixError> {
        {
            let mut session = self.session()?;
            session.check()?;
            session.check_timeout()?;
        }

        let best = self.ctx.chain.best_height()?;
        let changed = {
            let mut last = self.last_height.lock().map_err(|_| crate::storage_err!("mixing_node height", "poisoned"))?;
            let changed = *last != Some(best);
            *last = Some(best);
            changed
        };
        if changed {
            self.on_new_block(best)?;
        }

        if tick % SYNC_CADENCE_TICKS == 0 {
            self.sync_step()?;
        }
        if tick % SLOW_CADENCE_TICKS == 0 {
            self.slow_step(best)?;
        }
        Ok(())
    }

    fn sync_step(&self) -> Result<(), MixError> {
        self.ctx.registry.reset_sync_counters();
        self.ledger.reset_sync_counters();
        let round = self.sync_rounds.load(Ordering::SeqCst);
        if round >= STARTUP_SYNC_ROUNDS {
            return Ok(());
        }
        let request = if round == 0 { ProtocolMessage::RegistrySyncRequest { collateral: None } } else { ProtocolMessage::PaymentSyncRequest };
        debug!("startup sync round={} message_type={}", round, request.message_type());
        self.ctx.transport.broadcast(request)?;
        self.sync_rounds.store(round + 1, Ordering::SeqCst);
        Ok(())
    }

    fn slow_step(&self, best: u64) -> Result<(), MixError> {
        self.ctx.registry.check_all()?;
        let removed = self.ctx.registry.sweep()?;
        let pruned = self.ledger.prune(best)?;
        if removed > 0 || pruned > 0 {
            info!("maintenance sweep removed_nodes={} pruned_winners={}", removed, pruned);
        }
        self.send_ping()?;

        let mut driver = self.driver()?;
        if let Some(driver) = driver.as_mut() {
            let mut session = self.session()?;
            match driver.run(&mut session) {
                Ok(outcome) => debug!("auto mix pass outcome={:?}", outcome),
                Err(err) => debug!("auto mix pass failed error={}", err),
            }
        }
        Ok(())
    }

    fn send_ping(&self) -> Result<(), MixError> {
        let Some(relay) = self.relay.as_ref() else {
            return Ok(());
        };
        let now = self.ctx.clock.now_millis();
        let last = self.last_ping.load(Ordering::SeqCst);
        if last != 0 && now.saturating_sub(last) < relay.ping_interval_ms {
            return Ok(());
        }
        let ping = RelayPing::signed(relay.collateral, &relay.messaging, now)?;
        self.ctx.transport.broadcast(ProtocolMessage::RelayPing(ping))?;
        self.last_ping.store(now, Ordering::SeqCst);
        debug!("relay ping sent collateral={}", relay.collateral);
        Ok(())
    }
}

/// Drive [`MixingNode::on_tick`] once a second until `shutdown` flips to `true` or its
/// sender is dropped.
pub async fn run_maintenance_loop(node: Arc<MixingNode>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick += 1;
                if let Err(err) = node.on_tick(tick) {
                    warn!("maintenance tick failed tick={} error={}", tick, err);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("shutdown signal received ticks={}", tick);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::test_support::Harness;
    use crate::application::session::SessionConfig;
    use crate::domain::relay::RelayAnnouncement;
    use crate::domain::session::{EntryAcceptance, SessionState};
    use crate::foundation::util::time::Clock;
    use crate::domain::transaction::{pay_to_key_script, Transaction, TxIn, TxOut};
    use crate::foundation::{TxId, COIN, DENOMINATIONS, FEE_DENOMINATION, MAX_SYNC_REQUESTS_PER_PEER, RELAY_COLLATERAL, TERMINAL_DISPLAY_MS};
    use crate::infrastructure::config::MixingConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ledger(h: &Harness) -> Arc<PaymentWinnerLedger> {
        let authority = SigningKeypair::from_secret_bytes([43; 32]).expect("authority");
        Arc::new(PaymentWinnerLedger::new(h.registry.clone(), h.chain.clone(), h.transport.clone(), authority.key_id()))
    }

    fn coordinator_node(h: &Harness) -> MixingNode {
        MixingNode::new(ledger(h), h.coordinator(7))
    }

    fn second_relay(h: &Harness) -> RelayAnnouncement {
        let operator = SigningKeypair::from_secret_bytes([51; 32]).expect("operator");
        let messaging = SigningKeypair::from_secret_bytes([52; 32]).expect("messaging");
        let funding = Transaction::new(
            vec![TxIn::new(OutPoint::new(TxId::new([51; 32]), 0))],
            vec![TxOut::new(RELAY_COLLATERAL, pay_to_key_script(&operator.key_id()))],
        );
        let collateral = OutPoint::new(h.chain.add_transaction(funding, Some(30)), 0);
        RelayAnnouncement::signed(collateral, "relay:2", &operator, messaging.public_key(), h.clock.now_millis()).expect("sign")
    }

    #[test]
    fn test_dispatch_new_announcement_registers_and_relays() {
        let h = Harness::new();
        let node = coordinator_node(&h);
        let announcement = second_relay(&h);

        node.dispatch("peer:9", ProtocolMessage::RelayAnnouncement(announcement.clone())).expect("dispatch");
        assert_eq!(h.registry.enabled_count(), 2);
        assert_eq!(h.transport.broadcasts(), vec![ProtocolMessage::RelayAnnouncement(announcement.clone())]);

        node.dispatch("peer:9", ProtocolMessage::RelayAnnouncement(announcement)).expect("replay");
        assert_eq!(h.transport.broadcasts().len(), 1);
    }

    #[test]
    fn test_dispatch_registry_sync_capped_until_cadence_reset() {
        let h = Harness::new();
        let node = coordinator_node(&h);
        for _ in 0..MAX_SYNC_REQUESTS_PER_PEER + 1 {
            node.dispatch("peer:9", ProtocolMessage::RegistrySyncRequest { collateral: None }).expect("sync");
        }
        assert_eq!(h.transport.sent_to("peer:9").len(), MAX_SYNC_REQUESTS_PER_PEER as usize);

        node.on_tick(SYNC_CADENCE_TICKS).expect("tick");
        node.dispatch("peer:9", ProtocolMessage::RegistrySyncRequest { collateral: None }).expect("sync");
        assert_eq!(h.transport.sent_to("peer:9").len(), MAX_SYNC_REQUESTS_PER_PEER as usize + 1);
    }

    #[test]
    fn test_dispatch_handshake_reaches_coordinator_session() {
        let h = Harness::new();
        let node = coordinator_node(&h);
        let wallet = h.wallet(81);
        let collateral = h.good_collateral(&wallet);

        node.dispatch("joiner:1", ProtocolMessage::AmountHandshake { amount: DENOMINATIONS[3], collateral }).expect("dispatch");
        assert_eq!(node.session().expect("session").state(), SessionState::Queue);
        assert!(h.transport.sent_to("joiner:1").iter().any(|msg| matches!(
            msg,
            ProtocolMessage::StatusUpdate { accepted: EntryAcceptance::Accepted, .. }
        )));
    }

    #[test]
    fn test_startup_sync_asks_registry_then_payments_once() {
        let h = Harness::new();
        let node = coordinator_node(&h);
        for tick in 1..=20 {
            node.on_tick(tick).expect("tick");
        }
        let requests: Vec<_> = h
            .transport
            .broadcasts()
            .into_iter()
            .filter(|msg| matches!(msg, ProtocolMessage::RegistrySyncRequest { .. } | ProtocolMessage::PaymentSyncRequest))
            .collect();
        assert_eq!(requests, vec![ProtocolMessage::RegistrySyncRequest { collateral: None }, ProtocolMessage::PaymentSyncRequest]);
    }

    #[test]
    fn test_new_block_unlocks_participant_coins_on_boundary() {
        let h = Harness::new();
        let wallet = h.wallet(85);
        wallet.fund(COIN / 5, 0).expect("collateral coin");
        let mut session = MixingSession::participant(h.context(wallet.clone()), SessionConfig::default());
        session.ensure_collateral().expect("collateral");
        let node = MixingNode::new(ledger(&h), session);
        assert_eq!(wallet.locked_coins().len(), 1);

        node.on_new_block(201).expect("block");
        assert_eq!(wallet.locked_coins().len(), 1);
        node.on_new_block(210).expect("block");
        assert!(wallet.locked_coins().is_empty());
    }

    #[test]
    fn test_slow_cadence_runs_driver_and_pings() {
        let h = Harness::new();
        let wallet = h.wallet(95);
        for _ in 0..3 {
            wallet.fund(DENOMINATIONS[3], 0).expect("denominated");
        }
        wallet.fund(FEE_DENOMINATION, 0).expect("fee input");
        wallet.fund(COIN / 5, 0).expect("collateral coin");
        let ctx = h.context(wallet);
        let driver = AutoMixDriver::with_rng(ctx.clone(), MixingConfig { enabled: true, ..MixingConfig::default() }, StdRng::seed_from_u64(5));
        let identity = RelayIdentity { collateral: h.relay, messaging: h.messaging.clone(), ping_interval_ms: 60_000 };
        let node = MixingNode::new(ledger(&h), MixingSession::participant(ctx, SessionConfig::default()))
            .with_driver(driver)
            .with_relay_identity(identity);

        node.on_tick(SLOW_CADENCE_TICKS).expect("tick");
        assert!(h.transport.sent_to("coordinator:1").iter().any(|msg| matches!(msg, ProtocolMessage::AmountHandshake { .. })));
        assert_eq!(h.transport.broadcasts().iter().filter(|msg| matches!(msg, ProtocolMessage::RelayPing(_))).count(), 1);
        let driver = node.driver().expect("driver");
        assert_eq!(driver.as_ref().map(|d| d.last_result().to_string()), Some("mixing in progress".to_string()));

        drop(driver);
        node.on_tick(2 * SLOW_CADENCE_TICKS).expect("tick");
        assert_eq!(h.transport.broadcasts().iter().filter(|msg| matches!(msg, ProtocolMessage::RelayPing(_))).count(), 1);
        assert!(!node.session().expect("session").is_idle());
    }

    #[tokio::test]
    async fn test_maintenance_loop_ticks_until_shutdown() {
        let h = Harness::new();
        let node = Arc::new(coordinator_node(&h));
        let wallet = h.wallet(81);
        node.dispatch("joiner:1", ProtocolMessage::AmountHandshake { amount: DENOMINATIONS[3], collateral: h.good_collateral(&wallet) })
            .expect("dispatch");
        h.clock.advance_millis(TERMINAL_DISPLAY_MS + 31_000);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_maintenance_loop(node.clone(), rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).expect("send shutdown");
        tokio::time::timeout(Duration::from_secs(5), handle).await.expect("loop stopped").expect("join");

        let session = node.session().expect("session");
        assert_eq!(session.state(), SessionState::AcceptingEntries);
        assert_eq!(session.participant_count(), 0);
    }
}
