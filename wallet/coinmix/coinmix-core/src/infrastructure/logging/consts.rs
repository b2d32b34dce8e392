/// Main log file, all levels.
pub const LOG_FILE_NAME: &str = "coinmix.log";
/// Warnings and errors only.
pub const ERR_LOG_FILE_NAME: &str = "coinmix_err.log";

/// `timestamp [LEVEL] message [module] [thread-id]`, level colored for terminals.
pub const LOG_LINE_PATTERN_COLORED: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{h({l:5})}] {m} [{M}] [{I}]{n}";
pub const LOG_LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l:5}] {m} [{M}] [{I}]{n}";

/// Rotate at 20 MB.
pub const LOG_FILE_MAX_SIZE: u64 = 20_000_000;
pub const LOG_FILE_MAX_ROLLS: u32 = 4;

/// Crates logged at the application level; everything else stays off unless `root=<level>` is given.
pub const WHITELISTED_CRATES: &[&str] = &["coinmix_core"];

pub const DEFAULT_LOG_FILTERS: &str = "info";
