use super::MixingSession;
use crate::domain::session::{EntryAcceptance, SessionState};
use crate::foundation::{MixError, PARTICIPANT_TIMEOUT_GRACE_MS, SESSION_IDLE_TIMEOUT_MS, SIGNING_TIMEOUT_MS};
use log::{debug, info, warn};

impl MixingSession {
    /// Periodic timeout policy; called about once a second.
    pub fn check_timeout(&mut self) -> Result<(), MixError> {
        if !self.is_coordinator() && self.state == SessionState::Transmission {
            self.check()?;
        }

        match self.ctx.queue.sweep() {
            Ok(0) => {}
            Ok(removed) => debug!("expired queue announcements removed count={}", removed),
            Err(err) => warn!("queue sweep failed error={}", err),
        }

        let lag = if self.is_coordinator() { 0 } else { PARTICIPANT_TIMEOUT_GRACE_MS };
        if self.state.is_open() {
            self.drop_expired_entries();
            if self.idle_millis() >= SESSION_IDLE_TIMEOUT_MS + lag {
                let charged = self.charge_fees();
                info!(
                    "session idle, clearing parameters session_id={} role={:?} participant_count={} charged={}",
                    self.session_id,
                    self.role(),
                    self.participant_count,
                    charged
                );
                self.reset(false);
            }
        } else if self.state == SessionState::Signing && self.idle_millis() >= SIGNING_TIMEOUT_MS + lag {
            let charged = self.charge_fees();
            info!("signing timed out session_id={} charged={}", self.session_id, charged);
            self.fail_session("signing timed out, please resubmit");
        } else if !self.state.is_terminal() && self.idle_millis() >= SESSION_IDLE_TIMEOUT_MS + lag {
            self.fail_session("session timed out (30 seconds), please resubmit");
        }
        Ok(())
    }

    fn drop_expired_entries(&mut self) {
        let now = self.now();
        let ttl_ms = self.config.entry_ttl_ms;
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_expired_after(now, ttl_ms));
        let dropped = before - self.entries.len();
        if dropped == 0 {
            return;
        }
        debug!("expired entries dropped session_id={} count={}", self.session_id, dropped);
        if self.entries.is_empty() {
            self.reset(true);
            if self.is_coordinator() {
                self.relay_status(EntryAcceptance::Informational, "");
            }
        }
    }
}
