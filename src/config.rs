//! Service configuration read from the environment.
//!
//! Rocket's own settings (address, port, `databases.inbox_db.url`) come from
//! `Rocket.toml` and `ROCKET_*` variables; the knobs below cover the service
//! itself.

use std::env;

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound for `size` on paginated endpoints.
    pub max_page_size: i64,
    /// Apply pending migrations while igniting.
    pub run_migrations: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            max_page_size: env_i64("INBOX_MAX_PAGE_SIZE", 100).max(1),
            run_migrations: env_bool("INBOX_RUN_MIGRATIONS", true),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            run_migrations: true,
        }
    }
}
