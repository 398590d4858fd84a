//! # config
//!
//! Environment-driven configuration, read once at startup.
//!
//! | Variable             | Default          | Meaning                          |
//! |----------------------|------------------|----------------------------------|
//! | `BIND_ADDR`          | `0.0.0.0:3000`   | HTTP listen address              |
//! | `DATABASE_URL`       | — (required)     | PostgreSQL connection string     |
//! | `DEMO_MODE`          | `true`           | 10s poll interval vs 300s        |
//! | `POLL_INTERVAL_SECS` | per `DEMO_MODE`  | Explicit delay between ticks     |
//! | `API_KEY`            | unset (open)     | Optional `X-API-Key` requirement |

use std::time::Duration;

use anyhow::Context;

/// Inter-tick delay for a production deployment. Demo mode (the default for a
/// fresh checkout, so it visibly trades) polls every 10 seconds instead.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEMO_POLL_INTERVAL_SECS: u64 = 10;

/// Fund balance a service starts with when the create request omits one.
pub const DEFAULT_STARTING_BALANCE_CENTS: i64 = 100_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        // DEMO_MODE picks the baseline interval; an explicit
        // POLL_INTERVAL_SECS always wins.
        let baseline = if env_bool("DEMO_MODE", true) {
            DEMO_POLL_INTERVAL_SECS
        } else {
            DEFAULT_POLL_INTERVAL_SECS
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            database_url,
            poll_interval: Duration::from_secs(env_u64("POLL_INTERVAL_SECS", baseline)),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Single test for everything env-var driven — splitting these up would
    // race on the process environment.
    #[test]
    fn poll_interval_follows_demo_mode_and_explicit_override() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/daytrader");
        std::env::remove_var("POLL_INTERVAL_SECS");

        // Fresh checkout: demo mode, 10s.
        std::env::remove_var("DEMO_MODE");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.poll_interval,
            Duration::from_secs(DEMO_POLL_INTERVAL_SECS)
        );

        // Production: 300s.
        std::env::set_var("DEMO_MODE", "false");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.poll_interval,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );

        // Explicit interval beats the mode baseline.
        std::env::set_var("POLL_INTERVAL_SECS", "77");
        let config = Config::from_env().unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(77));

        std::env::remove_var("DEMO_MODE");
        std::env::remove_var("POLL_INTERVAL_SECS");
    }

    #[test]
    fn env_u64_falls_back_on_garbage() {
        std::env::set_var("POLL_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_u64("POLL_TEST_GARBAGE", 42), 42);
        assert_eq!(env_u64("POLL_TEST_UNSET", 7), 7);
    }
}
