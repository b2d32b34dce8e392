#![allow(dead_code)]

pub const TEST_CHAIN_HEIGHT: u64 = 200;
pub const TEST_START_MILLIS: u64 = 50_000_000;
pub const TEST_COORDINATOR_ADDRESS: &str = "coordinator:1";
pub const TEST_OPERATOR_SEED: u8 = 41;
pub const TEST_MESSAGING_SEED: u8 = 42;
pub const TEST_AUTHORITY_SEED: u8 = 43;
pub const TEST_COORDINATOR_WALLET_SEED: u8 = 90;
/// Upper bound on delivery rounds when draining peer traffic.
pub const TEST_PUMP_ROUNDS: usize = 32;
