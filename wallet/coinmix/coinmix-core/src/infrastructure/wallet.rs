//! Wallet contract: balances, coin selection, coin locking and input signing.

use crate::domain::denomination::{decompose_amount, is_denominated};
use crate::domain::rounds::MixHistory;
use crate::domain::session::EntryInput;
use crate::domain::signing::sign_input;
use crate::domain::transaction::{extract_pay_to_key, pay_to_key_script, OutPoint, Transaction, TxIn, TxOut};
use crate::foundation::{MixError, SigningKeypair, TxId, COIN, COLLATERAL_MIN, FEE_DENOMINATION};
use crate::infrastructure::chain::{ChainIndex, MemoryChain};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceScope {
    /// Denominated coins, confirmed or not.
    Denominated,
    /// Denominated coins still waiting for confirmation.
    UnconfirmedDenominated,
    NonDenominated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedCoin {
    pub txin: TxIn,
    pub value: u64,
    pub prev_script: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoinSelection {
    pub coins: Vec<SelectedCoin>,
    pub total: u64,
}

/// Inputs and denominated outputs ready to be submitted as a participant entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedEntry {
    pub inputs: Vec<EntryInput>,
    pub outputs: Vec<TxOut>,
    pub amount: u64,
}

pub trait Wallet: MixHistory + Send + Sync {
    fn balance(&self) -> Result<u64, MixError>;
    fn anonymized_balance(&self) -> Result<u64, MixError>;
    fn denominated_balance(&self, scope: BalanceScope) -> Result<u64, MixError>;
    /// Unlocked coins with mix rounds in `[min_rounds, max_rounds)` accumulated up to `max_total`.
    /// `None` when the accumulated value stays below `min_total`.
    fn select_coins(&self, min_total: u64, max_total: u64, min_rounds: i32, max_rounds: i32) -> Result<Option<CoinSelection>, MixError>;
    /// Whether fee-sized helper inputs are available.
    fn has_fee_inputs(&self) -> Result<bool, MixError>;
    fn create_collateral_transaction(&self) -> Result<Transaction, MixError>;
    fn prepare_denominate(&self, min_rounds: i32, amount: u64) -> Result<PreparedEntry, MixError>;
    /// Break up large coins, or with `collateral_only` just mint fee-sized inputs.
    fn split_funds(&self, collateral_only: bool) -> Result<(), MixError>;
    fn lock_coin(&self, outpoint: &OutPoint) -> Result<(), MixError>;
    fn unlock_coin(&self, outpoint: &OutPoint) -> Result<(), MixError>;
    fn is_locked(&self) -> bool;
    /// Script signature for `tx.inputs[input_index]` when this wallet owns `prev_script`.
    fn sign_input(&self, tx: &Transaction, input_index: usize, prev_script: &[u8]) -> Result<Option<Vec<u8>>, MixError>;
}

#[derive(Clone, Debug)]
struct WalletCoin {
    outpoint: OutPoint,
    value: u64,
    rounds: i32,
    confirmed: bool,
}

#[derive(Default)]
struct WalletInner {
    coins: Vec<WalletCoin>,
    transactions: HashMap<TxId, Transaction>,
    coin_locks: HashSet<OutPoint>,
    locked: bool,
    split_requests: Vec<bool>,
    funding_nonce: u64,
}

/// Single-key wallet that tracks its coins and their mix depth explicitly.
///
/// Funding transactions are indexed on the shared `MemoryChain` so collateral and mempool
/// checks can resolve them.
pub struct MemoryWallet {
    keypair: SigningKeypair,
    chain: Arc<MemoryChain>,
    target_rounds: i32,
    inner: Mutex<WalletInner>,
}

impl MemoryWallet {
    pub fn new(keypair: SigningKeypair, chain: Arc<MemoryChain>, target_rounds: i32) -> Self {
        Self { keypair, chain, target_rounds, inner: Mutex::new(WalletInner::default()) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, WalletInner>, MixError> {
        self.inner.lock().map_err(|_| MixError::StorageError { operation: "memory_wallet lock".to_string(), details: "poisoned".to_string() })
    }

    pub fn script(&self) -> Vec<u8> {
        pay_to_key_script(&self.keypair.key_id())
    }

    /// Credit a new confirmed coin with a known mix depth.
    pub fn fund(&self, value: u64, rounds: i32) -> Result<OutPoint, MixError> {
        self.fund_with(value, rounds, true)
    }

    pub fn fund_with(&self, value: u64, rounds: i32, confirmed: bool) -> Result<OutPoint, MixError> {
        let mut inner = self.lock_inner()?;
        inner.funding_nonce += 1;
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&inner.funding_nonce.to_le_bytes());
        seed[8..16].copy_from_slice(&self.keypair.key_id().as_hash()[..8]);
        let funding = Transaction::new(vec![TxIn::new(OutPoint::new(TxId::new(seed), 0))], vec![TxOut::new(value, self.script())]);
        let height = if confirmed { Some(self.chain_height()) } else { None };
        let txid = self.chain.add_transaction(funding.clone(), height);
        inner.transactions.insert(txid, funding);
        let outpoint = OutPoint::new(txid, 0);
        inner.coins.push(WalletCoin { outpoint, value, rounds, confirmed });
        Ok(outpoint)
    }

    fn chain_height(&self) -> u64 {
        self.chain.best_height().unwrap_or(0)
    }

    pub fn set_locked(&self, locked: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.locked = locked;
        }
    }

    pub fn locked_coins(&self) -> Vec<OutPoint> {
        self.inner.lock().map(|inner| inner.coin_locks.iter().copied().collect()).unwrap_or_default()
    }

    /// Every `split_funds` call so far, by `collateral_only` flag.
    pub fn split_requests(&self) -> Vec<bool> {
        self.inner.lock().map(|inner| inner.split_requests.clone()).unwrap_or_default()
    }

    fn spendable<'a>(inner: &'a WalletInner) -> impl Iterator<Item = &'a WalletCoin> + 'a {
        inner.coins.iter().filter(move |coin| !inner.coin_locks.contains(&coin.outpoint))
    }

    fn to_selected(&self, coin: &WalletCoin) -> SelectedCoin {
        SelectedCoin { txin: TxIn::new(coin.outpoint), value: coin.value, prev_script: self.script() }
    }
}

impl MixHistory for MemoryWallet {
    fn transaction(&self, txid: &TxId) -> Option<Transaction> {
        self.inner.lock().ok().and_then(|inner| inner.transactions.get(txid).cloned())
    }

    fn is_mine(&self, input: &TxIn) -> bool {
        let own = self.keypair.key_id();
        self.transaction(&input.prevout.txid)
            .and_then(|tx| tx.outputs.get(input.prevout.index as usize).cloned())
            .and_then(|out| extract_pay_to_key(&out.script_pubkey))
            .map(|key| key == own)
            .unwrap_or(false)
    }
}

impl Wallet for MemoryWallet {
    fn balance(&self) -> Result<u64, MixError> {
        Ok(self.lock_inner()?.coins.iter().map(|coin| coin.value).sum())
    }

    fn anonymized_balance(&self) -> Result<u64, MixError> {
        let inner = self.lock_inner()?;
        Ok(inner.coins.iter().filter(|coin| is_denominated(coin.value) && coin.rounds >= self.target_rounds).map(|coin| coin.value).sum())
    }

    fn denominated_balance(&self, scope: BalanceScope) -> Result<u64, MixError> {
        let inner = self.lock_inner()?;
        let total = inner
            .coins
            .iter()
            .filter(|coin| match scope {
                BalanceScope::Denominated => is_denominated(coin.value),
                BalanceScope::UnconfirmedDenominated => is_denominated(coin.value) && !coin.confirmed,
                BalanceScope::NonDenominated => !is_denominated(coin.value),
            })
            .map(|coin| coin.value)
            .sum();
        Ok(total)
    }

    fn select_coins(&self, min_total: u64, max_total: u64, min_rounds: i32, max_rounds: i32) -> Result<Option<CoinSelection>, MixError> {
        let inner = self.lock_inner()?;
        let mut selection = CoinSelection::default();
        for coin in Self::spendable(&inner) {
            if coin.value == FEE_DENOMINATION || coin.rounds < min_rounds || coin.rounds >= max_rounds {
                continue;
            }
            if selection.total.saturating_add(coin.value) > max_total {
                continue;
            }
            selection.total += coin.value;
            selection.coins.push(self.to_selected(coin));
        }
        if selection.coins.is_empty() || selection.total < min_total {
            return Ok(None);
        }
        Ok(Some(selection))
    }

    fn has_fee_inputs(&self) -> Result<bool, MixError> {
        let inner = self.lock_inner()?;
        let has = Self::spendable(&inner).any(|coin| coin.value == FEE_DENOMINATION);
        Ok(has)
    }

    fn create_collateral_transaction(&self) -> Result<Transaction, MixError> {
        let inner = self.lock_inner()?;
        let coin = Self::spendable(&inner)
            .filter(|coin| coin.value >= COLLATERAL_MIN && coin.value <= COIN)
            .min_by_key(|coin| coin.value)
            .ok_or_else(|| MixError::InsufficientFunds("no coin suitable for collateral".to_string()))?;
        let mut tx = Transaction::new(vec![TxIn::new(coin.outpoint)], vec![TxOut::new(coin.value - COLLATERAL_MIN, self.script())]);
        tx.inputs[0].script_sig = sign_input(&tx, 0, &self.keypair)?;
        Ok(tx)
    }

    fn prepare_denominate(&self, min_rounds: i32, amount: u64) -> Result<PreparedEntry, MixError> {
        let outputs: Vec<TxOut> = decompose_amount(amount).into_iter().map(|value| TxOut::new(value, self.script())).collect();
        let needed: u64 = outputs.iter().map(|out| out.value).sum();
        if outputs.is_empty() {
            return Err(MixError::InsufficientFunds(format!("amount {} has no denominated decomposition", amount)));
        }
        let inner = self.lock_inner()?;
        let mut inputs = Vec::new();
        let mut covered: u64 = 0;
        for coin in Self::spendable(&inner) {
            if covered >= needed {
                break;
            }
            if coin.value == FEE_DENOMINATION || coin.rounds < min_rounds {
                continue;
            }
            covered = covered.saturating_add(coin.value);
            inputs.push(EntryInput::new(TxIn::new(coin.outpoint), self.script()));
        }
        if covered < needed {
            return Err(MixError::InsufficientFunds(format!("cannot cover {}", needed)));
        }
        Ok(PreparedEntry { inputs, outputs, amount: needed })
    }

    fn split_funds(&self, collateral_only: bool) -> Result<(), MixError> {
        self.lock_inner()?.split_requests.push(collateral_only);
        Ok(())
    }

    fn lock_coin(&self, outpoint: &OutPoint) -> Result<(), MixError> {
        self.lock_inner()?.coin_locks.insert(*outpoint);
        Ok(())
    }

    fn unlock_coin(&self, outpoint: &OutPoint) -> Result<(), MixError> {
        self.lock_inner()?.coin_locks.remove(outpoint);
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.inner.lock().map(|inner| inner.locked).unwrap_or(true)
    }

    fn sign_input(&self, tx: &Transaction, input_index: usize, prev_script: &[u8]) -> Result<Option<Vec<u8>>, MixError> {
        if extract_pay_to_key(prev_script) != Some(self.keypair.key_id()) {
            return Ok(None);
        }
        sign_input(tx, input_index, &self.keypair).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rounds::input_mix_rounds;
    use crate::foundation::DENOMINATIONS;

    fn wallet(seed: u8) -> MemoryWallet {
        let chain = Arc::new(MemoryChain::with_height(5));
        MemoryWallet::new(SigningKeypair::from_secret_bytes([seed; 32]).expect("key"), chain, 2)
    }

    #[test]
    fn test_balances_split_by_denomination_and_rounds() {
        let w = wallet(61);
        w.fund(DENOMINATIONS[3], 2).expect("fund");
        w.fund(DENOMINATIONS[3], 0).expect("fund");
        w.fund_with(DENOMINATIONS[2], 0, false).expect("fund");
        w.fund(3 * COIN, -2).expect("fund");

        assert_eq!(w.anonymized_balance().expect("anon"), DENOMINATIONS[3]);
        assert_eq!(w.denominated_balance(BalanceScope::UnconfirmedDenominated).expect("unconf"), DENOMINATIONS[2]);
        assert_eq!(w.denominated_balance(BalanceScope::NonDenominated).expect("non"), 3 * COIN);
    }

    #[test]
    fn test_select_coins_skips_locked_and_respects_bounds() {
        let w = wallet(62);
        let a = w.fund(2 * COIN, -2).expect("fund");
        w.fund(5 * COIN, -2).expect("fund");
        w.lock_coin(&a).expect("lock");

        let selection = w.select_coins(COIN, 6 * COIN, -2, 9).expect("select").expect("some");
        assert_eq!(selection.total, 5 * COIN);
        assert!(w.select_coins(COIN, 4 * COIN, -2, 9).expect("select").is_none());
        assert!(w.select_coins(COIN, 6 * COIN, 0, 9).expect("select").is_none());
    }

    #[test]
    fn test_collateral_transaction_burns_minimum_fee() {
        let w = wallet(63);
        w.fund(COIN / 2, -2).expect("fund");
        let tx = w.create_collateral_transaction().expect("collateral");
        assert_eq!(tx.outputs[0].value, COIN / 2 - COLLATERAL_MIN);
        assert!(tx.inputs[0].is_signed());
    }

    #[test]
    fn test_is_mine_feeds_mix_rounds() {
        let w = wallet(64);
        let coin = w.fund(DENOMINATIONS[3], 0).expect("fund");
        // funding parent is external, so depth is unknown
        assert_eq!(input_mix_rounds(&w, &TxIn::new(coin)), -1);
        assert!(w.is_mine(&TxIn::new(coin)));
        assert!(!w.is_mine(&TxIn::new(OutPoint::new(TxId::new([1; 32]), 0))));
    }
}
