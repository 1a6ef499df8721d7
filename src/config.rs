use std::env;
use std::time::Duration;

use crate::services::change_listener::TRIGGER_CHANNEL;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Voting
    pub vote_rate_limit: u32,
    pub vote_rate_window_secs: usize,
    pub engine: EngineSettings,
}

/// Tunables for the counter-maintenance paths.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub vote_max_attempts: u32,
    pub vote_retry_backoff: Duration,
    pub maintainer_max_attempts: u32,
    pub reactive_maintainer_enabled: bool,
    pub interaction_channel: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            vote_max_attempts: 5,
            vote_retry_backoff: Duration::from_millis(10),
            maintainer_max_attempts: 3,
            reactive_maintainer_enabled: true,
            interaction_channel: TRIGGER_CHANNEL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = EngineSettings::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: env::var("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            vote_rate_limit: parse_var("VOTE_RATE_LIMIT", 100),
            vote_rate_window_secs: parse_var("VOTE_RATE_WINDOW_SECS", 3600),
            engine: EngineSettings {
                vote_max_attempts: parse_var("VOTE_MAX_ATTEMPTS", defaults.vote_max_attempts)
                    .max(1),
                vote_retry_backoff: Duration::from_millis(parse_var(
                    "VOTE_RETRY_BACKOFF_MS",
                    defaults.vote_retry_backoff.as_millis() as u64,
                )),
                maintainer_max_attempts: parse_var(
                    "MAINTAINER_MAX_ATTEMPTS",
                    defaults.maintainer_max_attempts,
                )
                .max(1),
                reactive_maintainer_enabled: parse_var(
                    "REACTIVE_MAINTAINER_ENABLED",
                    defaults.reactive_maintainer_enabled,
                ),
                interaction_channel: env::var("INTERACTION_CHANNEL")
                    .unwrap_or(defaults.interaction_channel),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_are_bounded() {
        let settings = EngineSettings::default();
        assert_eq!(settings.vote_max_attempts, 5);
        assert_eq!(settings.maintainer_max_attempts, 3);
        assert!(settings.reactive_maintainer_enabled);
        assert_eq!(settings.interaction_channel, TRIGGER_CHANNEL);
    }

    #[test]
    fn unparseable_values_fall_back() {
        assert_eq!(parse_var("VOTE_ENGINE_TEST_UNSET_KEY", 42u32), 42);
    }
}
