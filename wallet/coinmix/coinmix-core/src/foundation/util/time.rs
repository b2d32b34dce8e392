use crate::foundation::{MixError, TimestampMs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_millis_env(env_var: Option<&str>) -> Result<u64, MixError> {
    if let Some(var) = env_var {
        if let Ok(value) = std::env::var(var) {
            return value.parse::<u64>().map_err(|err| MixError::Message(err.to_string()));
        }
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|err| MixError::Message(err.to_string()))?;
    Ok(u64::try_from(now.as_millis()).unwrap_or(u64::MAX))
}

/// Returns the current wall-clock timestamp in milliseconds.
///
/// For test determinism, this respects `TEST_NOW_MILLIS_ENV_VAR` when set.
pub fn now_millis() -> u64 {
    current_timestamp_millis_env(Some(crate::foundation::constants::TEST_NOW_MILLIS_ENV_VAR))
        .or_else(|_| current_timestamp_millis_env(None))
        .unwrap_or(0)
}

/// Source of "now" for every timeout decision.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> TimestampMs;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> TimestampMs {
        now_millis()
    }
}

/// Manually advanced clock for simulations and tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: TimestampMs) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_millis)) }
    }

    pub fn set(&self, millis: TimestampMs) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: u64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_millis(secs.saturating_mul(crate::foundation::MILLIS_PER_SECOND));
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}
