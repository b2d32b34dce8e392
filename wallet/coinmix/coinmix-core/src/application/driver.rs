//! Auto-mix policy: decides when a participant should start a session and with whom.

use crate::application::session::{CoordinatorPeer, MixingSession, SessionContext};
use crate::domain::denomination::denominations_by_amount;
use crate::domain::relay::RelayNode;
use crate::domain::rounds::ROUNDS_NOT_DENOMINATED;
use crate::domain::transaction::OutPoint;
use crate::foundation::{
    MixError, COIN, MAX_CONNECTION_RETRIES, MAX_CONSECUTIVE_SPLITS, MAX_MIX_AMOUNT, MIN_MIX_AMOUNT, MIN_SESSION_INPUT, SPLIT_FUNDS_MIN_BLOCKS,
};
use crate::infrastructure::config::MixingConfig;
use crate::infrastructure::wallet::BalanceScope;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// What one driver cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MixOutcome {
    /// Nothing to do this cycle; the reason is user-facing.
    Skipped(String),
    /// A session is already under way.
    InProgress,
    SplitRequested { collateral_only: bool },
    Joined { relay: OutPoint, address: String, amount: u64 },
}

pub struct AutoMixDriver {
    ctx: SessionContext,
    config: MixingConfig,
    rng: StdRng,
    splits_in_a_row: u32,
    last_split_block: Option<u64>,
    seen_success: Option<u64>,
    used_relays: Vec<OutPoint>,
    last_result: String,
}

impl AutoMixDriver {
    pub fn new(ctx: SessionContext, config: MixingConfig) -> Self {
        Self::with_rng(ctx, config, StdRng::from_entropy())
    }

    pub fn with_rng(ctx: SessionContext, config: MixingConfig, rng: StdRng) -> Self {
        Self {
            ctx,
            config,
            rng,
            splits_in_a_row: 0,
            last_split_block: None,
            seen_success: None,
            used_relays: Vec::new(),
            last_result: String::new(),
        }
    }

    /// Human-readable result of the latest cycle.
    pub fn last_result(&self) -> &str {
        &self.last_result
    }

    pub fn splits_in_a_row(&self) -> u32 {
        self.splits_in_a_row
    }

    /// Run one policy cycle for `session`.
    pub fn run(&mut self, session: &mut MixingSession) -> Result<MixOutcome, MixError> {
        let outcome = self.decide(session);
        match &outcome {
            Ok(MixOutcome::Skipped(reason)) => {
                debug!("auto mix skipped reason={}", reason);
                self.last_result = reason.clone();
            }
            Ok(MixOutcome::InProgress) | Ok(MixOutcome::Joined { .. }) => self.last_result = "mixing in progress".to_string(),
            Ok(MixOutcome::SplitRequested { collateral_only }) => {
                self.last_result = format!("splitting funds collateral_only={}", collateral_only);
            }
            Err(err) => {
                warn!("auto mix failed error={}", err);
                self.last_result = err.to_string();
            }
        }
        outcome
    }

    fn decide(&mut self, session: &mut MixingSession) -> Result<MixOutcome, MixError> {
        if session.is_coordinator() {
            return Ok(skip("coordinators do not auto-mix"));
        }
        if !self.config.enabled {
            return Ok(skip("mixing is disabled"));
        }
        if self.config.lite_mode {
            return Ok(skip("lite mode does not mix"));
        }
        if session.state().is_terminal() {
            return Ok(skip("waiting for the previous session to reset"));
        }

        let best = self.ctx.chain.best_height()?;
        if session.last_success_block() != self.seen_success {
            self.seen_success = session.last_success_block();
            self.splits_in_a_row = 0;
        }
        if let Some(last) = session.last_success_block() {
            if best.saturating_sub(last) < self.config.blocks_between_successes {
                return Ok(skip("last successful mix was too recent"));
            }
        }
        if self.ctx.wallet.is_locked() {
            return Err(MixError::WalletLocked);
        }
        if !session.is_idle() {
            return Ok(MixOutcome::InProgress);
        }
        if self.ctx.registry.enabled_count() == 0 {
            return Ok(skip("no relay nodes detected"));
        }

        let balance = self.ctx.wallet.balance()?;
        let anonymized = self.ctx.wallet.anonymized_balance()?;
        let mut needs = balance.saturating_sub(anonymized).min(self.config.anonymize_amount.saturating_mul(COIN));
        if needs < MIN_MIX_AMOUNT {
            return Ok(skip("not enough funds to anonymize"));
        }
        needs = needs.min(MAX_MIX_AMOUNT);

        let Some(selection) = self.ctx.wallet.select_coins(MIN_SESSION_INPUT, needs, 0, self.config.rounds)? else {
            let oversized = self.ctx.wallet.select_coins(MIN_SESSION_INPUT, u64::MAX, ROUNDS_NOT_DENOMINATED, 0)?;
            if oversized.is_some() {
                return self.try_split(best, false);
            }
            return Ok(skip("no funds in need of denominating"));
        };
        if !self.ctx.wallet.has_fee_inputs()? {
            return self.try_split(best, true);
        }
        if self.ctx.wallet.denominated_balance(BalanceScope::UnconfirmedDenominated)? > 0 {
            return Ok(skip("waiting for unconfirmed denominated outputs to confirm"));
        }

        let amount = selection.total.min(MAX_MIX_AMOUNT);
        self.connect_and_join(session, amount)
    }

    fn try_split(&mut self, best: u64, collateral_only: bool) -> Result<MixOutcome, MixError> {
        if let Some(last) = self.last_split_block {
            if best.saturating_sub(last) < SPLIT_FUNDS_MIN_BLOCKS {
                return Ok(skip("split requested too recently"));
            }
        }
        if self.splits_in_a_row >= MAX_CONSECUTIVE_SPLITS {
            return Ok(skip("split limit reached, waiting for a successful mix"));
        }
        self.ctx.wallet.split_funds(collateral_only)?;
        self.last_split_block = Some(best);
        self.splits_in_a_row += 1;
        info!("split funds requested collateral_only={} height={} in_a_row={}", collateral_only, best, self.splits_in_a_row);
        Ok(MixOutcome::SplitRequested { collateral_only })
    }

    /// Queue matches first, then random registry picks, bounded by the retry counter.
    fn connect_and_join(&mut self, session: &mut MixingSession, amount: u64) -> Result<MixOutcome, MixError> {
        let mask = denominations_by_amount(amount);
        if self.used_relays.len() >= self.ctx.registry.enabled_count() {
            self.used_relays.clear();
        }

        let mut attempts = 0;
        while attempts < MAX_CONNECTION_RETRIES {
            attempts += 1;
            let candidate = match self.ctx.queue.match_and_consume(mask)? {
                Some(announcement) => self.ctx.registry.get(&announcement.relay),
                None => self.ctx.registry.random_enabled(&mut self.rng),
            };
            let Some(node) = candidate else {
                return Ok(skip("no relay node available"));
            };
            if self.used_relays.contains(&node.collateral) {
                debug!("relay already used this round relay={}", node.collateral);
                continue;
            }
            if !self.connect(&node, attempts) {
                continue;
            }
            self.used_relays.push(node.collateral);
            session.begin_session(CoordinatorPeer { relay: node.collateral, address: node.address.clone() }, amount)?;
            return Ok(MixOutcome::Joined { relay: node.collateral, address: node.address, amount });
        }
        Err(MixError::RetriesExhausted { attempts })
    }

    fn connect(&self, node: &RelayNode, attempt: u32) -> bool {
        debug!("connecting to coordinator attempt={} address={}", attempt, node.address);
        match self.ctx.transport.connect(&node.address) {
            Ok(true) => true,
            Ok(false) => {
                debug!("coordinator unreachable address={}", node.address);
                false
            }
            Err(err) => {
                warn!("coordinator connect failed address={} error={}", node.address, err);
                false
            }
        }
    }
}

fn skip(reason: &str) -> MixOutcome {
    MixOutcome::Skipped(reason.to_string())
}
