use chrono_tz::Tz;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Driver time zone is a known IANA name
/// - At least one job may run at a time
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.driver.time_zone.parse::<Tz>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "driver.time_zone is not a valid IANA zone: {}",
            config.driver.time_zone
        )));
    }

    if config.driver.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "driver.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriverConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_unknown_time_zone_fails() {
        let config = Config {
            driver: DriverConfig {
                time_zone: "Mars/Olympus_Mons".to_string(),
                ..DriverConfig::default()
            },
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let config = Config {
            driver: DriverConfig {
                max_concurrent_jobs: 0,
                ..DriverConfig::default()
            },
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_negative_batch_size_is_allowed() {
        let config = Config {
            driver: DriverConfig {
                batch_size: -5,
                ..DriverConfig::default()
            },
            ..Config::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
