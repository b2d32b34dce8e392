mod loader;
mod types;
pub mod validation;

pub use loader::{load_config, load_config_from_file, load_config_from_str, CONFIG_FILE_NAME, ENV_PREFIX};
pub use types::*;

use crate::domain::transaction::OutPoint;
use crate::foundation::{KeyId, MixError, SigningKeypair};
use secp256k1::PublicKey;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "COINMIX_CONFIG_PATH";
pub const DATA_DIR_ENV: &str = "COINMIX_DATA_DIR";

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty()).map(PathBuf::from)
}

pub fn resolve_data_dir() -> Result<PathBuf, MixError> {
    if let Some(dir) = env_path(DATA_DIR_ENV) {
        return Ok(dir);
    }
    let cwd = std::env::current_dir().map_err(|err| crate::storage_err!("env::current_dir", err))?;
    Ok(cwd.join(".coinmix"))
}

pub fn resolve_config_path(data_dir: &Path) -> PathBuf {
    env_path(CONFIG_PATH_ENV).unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME))
}

/// Resolve, load and validate the node configuration.
pub fn load_app_config() -> Result<AppConfig, MixError> {
    let data_dir = resolve_data_dir()?;
    let config = load_config_from_file(&resolve_config_path(&data_dir), &data_dir)?;
    config.validate().map_err(|errors| MixError::ConfigError(format!("validation failed: {:?}", errors)))?;
    Ok(config)
}

impl RelayConfig {
    pub fn collateral_outpoint(&self) -> Result<Option<OutPoint>, MixError> {
        self.collateral.as_deref().map(str::trim).filter(|raw| !raw.is_empty()).map(str::parse).transpose()
    }

    pub fn messaging_keypair(&self) -> Result<Option<SigningKeypair>, MixError> {
        self.messaging_key_hex.as_deref().map(SigningKeypair::from_secret_hex).transpose()
    }
}

impl PaymentsConfig {
    pub fn authority_key_id(&self) -> Result<Option<KeyId>, MixError> {
        let Some(hex) = self.authority_pubkey_hex.as_deref() else {
            return Ok(None);
        };
        let bytes = crate::foundation::util::encoding::decode_hex(hex)?;
        let key = PublicKey::from_slice(&bytes)?;
        Ok(Some(crate::foundation::key_id(&key)))
    }

    pub fn authority_keypair(&self) -> Result<Option<SigningKeypair>, MixError> {
        self.authority_secret_hex.as_deref().map(SigningKeypair::from_secret_hex).transpose()
    }
}
