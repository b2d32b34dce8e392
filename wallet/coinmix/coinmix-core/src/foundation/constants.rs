//! Protocol-wide constants for mixing sessions and relay node election.

/// Base units per coin.
pub const COIN: u64 = 100_000_000;

/// Milliseconds per second.
pub const MILLIS_PER_SECOND: u64 = 1_000;

/// Canonical mixing denominations, largest first.
///
/// Each tier is a round coin amount plus one base unit so denominated outputs are
/// distinguishable from ordinary payments. Bit `i` of a denomination mask refers to tier `i`.
pub const DENOMINATIONS: [u64; 4] = [500 * COIN + 1, 100 * COIN + 1, 10 * COIN + 1, COIN + 1];

/// Fee-sized helper output. Treated as a pass-through when counting mix rounds.
pub const FEE_DENOMINATION: u64 = COIN / 80;

/// Minimum fee a collateral transaction must burn (0.1 coin).
pub const COLLATERAL_MIN: u64 = COIN / 10;

/// Bond a relay node must hold in its collateral output.
pub const RELAY_COLLATERAL: u64 = 1_000 * COIN;

/// Largest amount a single session will mix.
pub const MAX_POOL_AMOUNT: u64 = 1_000 * COIN;

/// Upper bound on how many outputs of one tier a decomposition may produce.
pub const MAX_OUTPUTS_PER_TIER: usize = 10;

/// Default participant cap per session.
pub const DEFAULT_PARTICIPANT_CAP: usize = 3;

/// Queue announcements live this long (120 seconds).
pub const QUEUE_TTL_MS: u64 = 120 * MILLIS_PER_SECOND;

/// Incomplete participant entries are dropped after this long (120 seconds).
pub const ENTRY_TTL_MS: u64 = 120 * MILLIS_PER_SECOND;

/// Idle window for accepting/queue states before parameters are cleared.
pub const SESSION_IDLE_TIMEOUT_MS: u64 = 30 * MILLIS_PER_SECOND;

/// Idle window while collecting signatures.
pub const SIGNING_TIMEOUT_MS: u64 = 10 * MILLIS_PER_SECOND;

/// Extra grace a participant grants before timing out, so the coordinator always fires first.
pub const PARTICIPANT_TIMEOUT_GRACE_MS: u64 = 10 * MILLIS_PER_SECOND;

/// How long `Success`/`Error` stay visible before the session resets.
pub const TERMINAL_DISPLAY_MS: u64 = 10 * MILLIS_PER_SECOND;

/// Relay node not seen for this long is `Expired` (65 minutes).
pub const RELAY_EXPIRATION_MS: u64 = 65 * 60 * MILLIS_PER_SECOND;

/// Relay node not seen for this long is `PendingRemoval` (70 minutes).
pub const RELAY_REMOVAL_MS: u64 = 70 * 60 * MILLIS_PER_SECOND;

/// Minimum spacing between accepted pings from one relay node (30 minutes).
pub const RELAY_MIN_PING_MS: u64 = 30 * 60 * MILLIS_PER_SECOND;

/// Announcements signed further than this into the future are refused (1 hour).
pub const RELAY_MAX_FUTURE_MS: u64 = 60 * 60 * MILLIS_PER_SECOND;

/// Payment scores reference the block this many heights below the target.
pub const PAYMENT_MATURITY_OFFSET: u64 = 576;

/// Ledger entries deeper than this below the best height are pruned.
pub const PAYMENT_PRUNE_DEPTH: u64 = 4;

/// Sync replays winners from `best - PAYMENT_SYNC_BEHIND` ...
pub const PAYMENT_SYNC_BEHIND: u64 = 10;

/// ... through `best + PAYMENT_SYNC_AHEAD`.
pub const PAYMENT_SYNC_AHEAD: u64 = 20;

/// Votes are cast this many blocks ahead of the current tip.
pub const PAYMENT_VOTE_LEAD: u64 = 10;

/// Rotation threshold, as a percentage of the enabled node count.
pub const PAYMENT_ROTATION_PERCENT: u64 = 90;

/// Maximum hops walked backwards when counting mix rounds.
pub const MAX_MIX_DEPTH: i32 = 9;

/// Maximum coordinator connection attempts per mixing cycle.
pub const MAX_CONNECTION_RETRIES: u32 = 10;

/// Split-funds may run at most this many times in a row ...
pub const MAX_CONSECUTIVE_SPLITS: u32 = 2;

/// ... and only when this many blocks passed since the previous split.
pub const SPLIT_FUNDS_MIN_BLOCKS: u64 = 10;

/// Below this amount the driver does not bother mixing (2.5 coin).
pub const MIN_MIX_AMOUNT: u64 = 5 * COIN / 2;

/// Hard cap on a single cycle's target amount.
pub const MAX_MIX_AMOUNT: u64 = 999 * COIN;

/// Candidate inputs worth less than this cannot fund a session (1.1 coin).
pub const MIN_SESSION_INPUT: u64 = 11 * COIN / 10;

/// Session identifiers drawn by a coordinator fall in `1..=SESSION_ID_MAX`.
pub const SESSION_ID_MAX: u32 = 999_999;

/// Participants release locked coins every this many blocks.
pub const UNLOCK_EVERY_BLOCKS: u64 = 10;

/// Maximum sync requests served per peer per cadence.
pub const MAX_SYNC_REQUESTS_PER_PEER: u32 = 2;

/// Environment variable that pins the wall clock in tests (milliseconds since epoch).
pub const TEST_NOW_MILLIS_ENV_VAR: &str = "COINMIX_TEST_NOW_MILLIS";

/// Coordinator grace in `Transmission` before the session resets.
pub const COMPLETION_GRACE_MS: u64 = 3 * MILLIS_PER_SECOND;

/// Confirmations a relay collateral needs before its announcement is admitted.
pub const RELAY_MIN_CONFIRMATIONS: u64 = 15;
