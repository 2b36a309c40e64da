use std::fs;
use std::path::Path;

use crate::error::Error;

/// Mailblast engine configuration settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of the dispatch queue's worker pool
    pub workers: usize,

    /// Global throughput cap in jobs per second. Zero means uncapped.
    pub max_jobs_per_second: u32,

    /// Base delay before the first retry of a deferred job. The delay
    /// doubles per attempt up to `max_retry_delay_secs`.
    pub base_retry_delay_secs: u64,

    /// Ceiling on the retry backoff delay
    pub max_retry_delay_secs: u64,

    /// Total delivery attempts per job before a deferral becomes a
    /// permanent failure
    pub max_attempts: u8,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            workers: 4,
            max_jobs_per_second: 0,
            base_retry_delay_secs: 60,
            max_retry_delay_secs: 900,
            max_attempts: 3,
        }
    }
}

impl Config {
    pub fn is_valid(&self) -> bool {
        self.workers > 0 && self.max_attempts > 0
    }

    /// Load a configuration from a TOML file. Missing keys take their
    /// default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().is_valid());
    }

    #[test]
    fn test_zero_workers_is_invalid() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("workers = 8\nmax_jobs_per_second = 50\n").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.max_jobs_per_second, 50);
        assert_eq!(config.max_attempts, 3);
    }
}
