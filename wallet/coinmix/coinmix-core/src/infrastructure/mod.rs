//! Infrastructure layer: collaborator contracts, in-memory implementations, config and logging.

pub mod chain;
pub mod config;
pub mod logging;
pub mod mempool;
pub mod transport;
pub mod wallet;
