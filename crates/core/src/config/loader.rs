use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `HARVESTER_DRIVER__BATCH_SIZE=4`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("HARVESTER_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Short fingerprint of the effective configuration, stored with each audit record.
pub fn config_fingerprint(config: &Config) -> String {
    let serialized = toml::to_string(config).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}
