//! Configuration loading and representation.
//!
//! Values are read once at process start and are read-only afterwards.

use std::net::SocketAddr;

/// Default maximum of concurrently running jobs per tenant.
pub const DEFAULT_MAX_CONCURRENT_JOBS: u32 = 3;

/// Default listen address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid {expected}: {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Process-wide application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Max concurrently running jobs per tenant (`MAX_CONCURRENT_JOBS`).
    pub max_concurrent_jobs: u32,
    /// HTTP listen address (`BIND_ADDR`).
    pub bind_addr: SocketAddr,
    /// Centralized counter store (`REDIS_URL`); in-memory when unset.
    pub redis_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            redis_url: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_concurrent_jobs = match lookup("MAX_CONCURRENT_JOBS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                var: "MAX_CONCURRENT_JOBS",
                expected: "non-negative integer",
                value: raw,
            })?,
            None => DEFAULT_MAX_CONCURRENT_JOBS,
        };

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid {
                var: "BIND_ADDR",
                expected: "socket address",
                value: bind_raw.clone(),
            })?;

        let redis_url = lookup("REDIS_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            max_concurrent_jobs,
            bind_addr,
            redis_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.max_concurrent_jobs, 3);
    }

    #[test]
    fn reads_all_variables() {
        let cfg = load(&[
            ("MAX_CONCURRENT_JOBS", "7"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("REDIS_URL", "redis://cache:6379"),
        ])
        .unwrap();

        assert_eq!(cfg.max_concurrent_jobs, 7);
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn invalid_limit_is_an_error() {
        let err = load(&[("MAX_CONCURRENT_JOBS", "-1")]).unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENT_JOBS"));
    }

    #[test]
    fn invalid_bind_addr_is_an_error() {
        assert!(load(&[("BIND_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn blank_redis_url_means_in_memory() {
        let cfg = load(&[("REDIS_URL", "  ")]).unwrap();
        assert!(cfg.redis_url.is_none());
    }
}
