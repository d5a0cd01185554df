//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::WorkerConfig;

/// Worker process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `WORKER_CONCURRENCY` — bound on concurrent message handlers (default: 4)
/// - `POLL_WAIT_SECS` — long-poll wait per receive (default: 20)
/// - `VISIBILITY_TIMEOUT_SECS` — redelivery delay for unacked messages
///   (default: 300)
/// - `GATEWAY_TIMEOUT_SECS` — bounded timeout per gateway call (default: 30)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub poll_wait_secs: u64,
    pub visibility_timeout_secs: u64,
    pub gateway_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            concurrency: env_parse("WORKER_CONCURRENCY", 4),
            poll_wait_secs: env_parse("POLL_WAIT_SECS", 20),
            visibility_timeout_secs: env_parse("VISIBILITY_TIMEOUT_SECS", 300),
            gateway_timeout_secs: env_parse("GATEWAY_TIMEOUT_SECS", 30),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Builds the worker configuration.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.concurrency,
            poll_wait: Duration::from_secs(self.poll_wait_secs),
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            gateway_timeout: Duration::from_secs(self.gateway_timeout_secs),
            ..WorkerConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_wait_secs: 20,
            visibility_timeout_secs: 300,
            gateway_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
