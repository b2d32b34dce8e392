//! Layered configuration loading.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (`COINMIX_` prefix, `__` separates nesting)

use crate::foundation::MixError;
use crate::infrastructure::config::types::AppConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::{debug, info};
use std::path::Path;

/// Example: `COINMIX_MIXING__PARTICIPANT_CAP=5` -> `mixing.participant_cap`
pub const ENV_PREFIX: &str = "COINMIX_";
pub const CONFIG_FILE_NAME: &str = "coinmix.toml";

fn figment_for(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
}

fn postprocess(config: &mut AppConfig, data_dir: &Path) {
    if config.service.data_dir.trim().is_empty() {
        config.service.data_dir = data_dir.display().to_string();
    }
}

/// Load `coinmix.toml` from `data_dir`; a missing file leaves defaults and env in effect.
pub fn load_config(data_dir: &Path) -> Result<AppConfig, MixError> {
    load_config_from_file(&data_dir.join(CONFIG_FILE_NAME), data_dir)
}

pub fn load_config_from_file(path: &Path, data_dir: &Path) -> Result<AppConfig, MixError> {
    info!("loading configuration path={} data_dir={}", path.display(), data_dir.display());
    let mut config: AppConfig = figment_for(path).merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
    postprocess(&mut config, data_dir);
    debug!(
        "configuration loaded mixing_enabled={} participant_cap={} is_relay={} lite_mode={}",
        config.mixing.enabled, config.mixing.participant_cap, config.relay.is_relay, config.mixing.lite_mode
    );
    Ok(config)
}

/// Parse a TOML document directly, without environment overrides.
pub fn load_config_from_str(toml: &str, data_dir: &Path) -> Result<AppConfig, MixError> {
    let mut config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml)).extract()?;
    postprocess(&mut config, data_dir);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_when_file_missing_then_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_file(&dir.path().join("absent.toml"), dir.path()).expect("load");
        assert_eq!(config.mixing.participant_cap, crate::foundation::DEFAULT_PARTICIPANT_CAP);
        assert_eq!(config.service.data_dir, dir.path().display().to_string());
    }

    #[test]
    fn test_load_config_when_file_present_then_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "[mixing]\nenabled = true\nparticipant_cap = 5\n\n[relay]\nis_relay = false\naddress = \"10.0.0.1:9999\"").expect("write");

        let config = load_config(dir.path()).expect("load");
        assert!(config.mixing.enabled);
        assert_eq!(config.mixing.participant_cap, 5);
        assert_eq!(config.relay.address, "10.0.0.1:9999");
        assert_eq!(config.mixing.rounds, crate::infrastructure::config::DEFAULT_MIX_ROUNDS);
    }

    #[test]
    fn test_load_config_from_str_when_bad_type_then_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config_from_str("[mixing]\nparticipant_cap = \"many\"", dir.path()).expect_err("invalid");
        assert_eq!(err.code(), crate::foundation::ErrorCode::ConfigError);
    }
}
