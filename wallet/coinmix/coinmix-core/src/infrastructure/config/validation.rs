use crate::domain::transaction::OutPoint;
use crate::foundation::{MAX_MIX_DEPTH, SigningKeypair};
use crate::infrastructure::config::types::AppConfig;
use secp256k1::PublicKey;

const MIN_ANONYMIZE_AMOUNT: u64 = 2;
const MAX_ANONYMIZE_AMOUNT: u64 = 999_999;
const MIN_PARTICIPANT_CAP: usize = 2;

impl AppConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mixing = &self.mixing;

        if mixing.participant_cap < MIN_PARTICIPANT_CAP {
            errors.push(format!("mixing.participant_cap must be >= {}", MIN_PARTICIPANT_CAP));
        }
        if !(MIN_ANONYMIZE_AMOUNT..=MAX_ANONYMIZE_AMOUNT).contains(&mixing.anonymize_amount) {
            errors.push(format!(
                "mixing.anonymize_amount must be within {}..={} (got {})",
                MIN_ANONYMIZE_AMOUNT, MAX_ANONYMIZE_AMOUNT, mixing.anonymize_amount
            ));
        }
        if mixing.rounds < 1 || mixing.rounds > MAX_MIX_DEPTH {
            errors.push(format!("mixing.rounds must be within 1..={}", MAX_MIX_DEPTH));
        }
        if mixing.entry_ttl_secs == 0 {
            errors.push("mixing.entry_ttl_secs must be > 0".to_string());
        }
        if mixing.queue_ttl_secs == 0 {
            errors.push("mixing.queue_ttl_secs must be > 0".to_string());
        }
        if mixing.lite_mode && self.relay.is_relay {
            errors.push("relay.is_relay cannot be combined with mixing.lite_mode".to_string());
        }

        if self.relay.is_relay {
            match self.relay.collateral.as_deref().map(str::trim) {
                None | Some("") => errors.push("relay.collateral is required when relay.is_relay=true".to_string()),
                Some(raw) => {
                    if raw.parse::<OutPoint>().is_err() {
                        errors.push(format!("invalid relay.collateral outpoint: {}", raw));
                    }
                }
            }
            if self.relay.address.trim().is_empty() {
                errors.push("relay.address is required when relay.is_relay=true".to_string());
            }
            match self.relay.messaging_key_hex.as_deref() {
                None => errors.push("relay.messaging_key_hex is required when relay.is_relay=true".to_string()),
                Some(hex) => {
                    if SigningKeypair::from_secret_hex(hex).is_err() {
                        errors.push("relay.messaging_key_hex is not a valid secret key".to_string());
                    }
                }
            }
            if self.relay.ping_interval_secs == 0 {
                errors.push("relay.ping_interval_secs must be > 0".to_string());
            }
        }

        if let Some(hex) = self.payments.authority_pubkey_hex.as_deref() {
            let valid = hex::decode(hex.trim().trim_start_matches("0x")).ok().and_then(|bytes| PublicKey::from_slice(&bytes).ok());
            if valid.is_none() {
                errors.push(format!("invalid payments.authority_pubkey_hex: {}", hex));
            }
        }
        if let Some(secret) = self.payments.authority_secret_hex.as_deref() {
            if SigningKeypair::from_secret_hex(secret).is_err() {
                errors.push("payments.authority_secret_hex is not a valid secret key".to_string());
            } else if self.payments.authority_pubkey_hex.is_none() {
                errors.push("payments.authority_secret_hex requires payments.authority_pubkey_hex".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
