//! iNaturalist client settings resolution
//!
//! Each setting resolves independently with priority:
//! 1. Environment variable (highest priority)
//! 2. TOML config `[inat]` section
//! 3. Built-in default

use plantkeep_common::config::TomlConfig;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.inaturalist.org/v1";
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 4;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 1;

pub const BASE_URL_ENV_VAR: &str = "PLANTKEEP_INAT_BASE_URL";
pub const LOOKUP_TIMEOUT_ENV_VAR: &str = "PLANTKEEP_INAT_LOOKUP_TIMEOUT_MS";
pub const LOOKUP_CONCURRENCY_ENV_VAR: &str = "PLANTKEEP_INAT_LOOKUP_CONCURRENCY";
pub const REQUESTS_PER_SECOND_ENV_VAR: &str = "PLANTKEEP_INAT_REQUESTS_PER_SECOND";

/// Resolved iNaturalist settings
#[derive(Debug, Clone, PartialEq)]
pub struct InatSettings {
    pub base_url: String,
    pub lookup_timeout: Duration,
    pub lookup_concurrency: usize,
    pub requests_per_second: u32,
}

impl Default for InatSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

impl InatSettings {
    /// Resolve settings from environment and TOML config
    pub fn resolve(toml_config: &TomlConfig) -> Self {
        let inat = &toml_config.inat;

        let base_url = env_string(BASE_URL_ENV_VAR)
            .or_else(|| inat.base_url.clone().filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_ms = env_parsed::<u64>(LOOKUP_TIMEOUT_ENV_VAR)
            .or(inat.lookup_timeout_ms)
            .filter(|&ms| ms > 0)
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS);

        let lookup_concurrency = env_parsed::<usize>(LOOKUP_CONCURRENCY_ENV_VAR)
            .or(inat.lookup_concurrency)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_LOOKUP_CONCURRENCY);

        let requests_per_second = env_parsed::<u32>(REQUESTS_PER_SECOND_ENV_VAR)
            .or(inat.requests_per_second)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND);

        let settings = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            lookup_timeout: Duration::from_millis(timeout_ms),
            lookup_concurrency,
            requests_per_second,
        };
        debug!(?settings, "iNaturalist settings resolved");
        settings
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
