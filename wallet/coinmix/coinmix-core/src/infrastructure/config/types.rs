use crate::foundation::{
    DEFAULT_PARTICIPANT_CAP, ENTRY_TTL_MS, MILLIS_PER_SECOND, QUEUE_TTL_MS, RELAY_MIN_PING_MS,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ANONYMIZE_AMOUNT: u64 = 1_000;
pub const DEFAULT_MIX_ROUNDS: i32 = 2;
pub const DEFAULT_BLOCKS_BETWEEN_SUCCESSES: u64 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mixing: MixingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Participant-side mixing behaviour and coordinator session limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Entries a coordinator collects before building the draft.
    #[serde(default = "default_participant_cap")]
    pub participant_cap: usize,
    /// Target anonymized balance, whole coins.
    #[serde(default = "default_anonymize_amount")]
    pub anonymize_amount: u64,
    #[serde(default = "default_mix_rounds")]
    pub rounds: i32,
    #[serde(default = "default_blocks_between_successes")]
    pub blocks_between_successes: u64,
    /// Lite nodes never coordinate and never mix.
    #[serde(default)]
    pub lite_mode: bool,
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,
    #[serde(default = "default_queue_ttl_secs")]
    pub queue_ttl_secs: u64,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            participant_cap: default_participant_cap(),
            anonymize_amount: default_anonymize_amount(),
            rounds: default_mix_rounds(),
            blocks_between_successes: default_blocks_between_successes(),
            lite_mode: false,
            entry_ttl_secs: default_entry_ttl_secs(),
            queue_ttl_secs: default_queue_ttl_secs(),
        }
    }
}

impl MixingConfig {
    pub fn entry_ttl_ms(&self) -> u64 {
        self.entry_ttl_secs.saturating_mul(MILLIS_PER_SECOND)
    }

    pub fn queue_ttl_ms(&self) -> u64 {
        self.queue_ttl_secs.saturating_mul(MILLIS_PER_SECOND)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub is_relay: bool,
    /// `txid:index` of this node's bonded collateral.
    #[serde(default)]
    pub collateral: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub messaging_key_hex: Option<String>,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            is_relay: false,
            collateral: None,
            address: String::new(),
            messaging_key_hex: None,
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Compressed secp256k1 key that signs payment winners.
    #[serde(default)]
    pub authority_pubkey_hex: Option<String>,
    /// Only the voting authority sets this.
    #[serde(default)]
    pub authority_secret_hex: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub log_filters: Option<String>,
}

fn default_participant_cap() -> usize {
    DEFAULT_PARTICIPANT_CAP
}

fn default_anonymize_amount() -> u64 {
    DEFAULT_ANONYMIZE_AMOUNT
}

fn default_mix_rounds() -> i32 {
    DEFAULT_MIX_ROUNDS
}

fn default_blocks_between_successes() -> u64 {
    DEFAULT_BLOCKS_BETWEEN_SUCCESSES
}

fn default_entry_ttl_secs() -> u64 {
    ENTRY_TTL_MS / MILLIS_PER_SECOND
}

fn default_queue_ttl_secs() -> u64 {
    QUEUE_TTL_MS / MILLIS_PER_SECOND
}

fn default_ping_interval_secs() -> u64 {
    RELAY_MIN_PING_MS / MILLIS_PER_SECOND
}
