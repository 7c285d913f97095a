//! Centralized worker configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables, e.g. `DATABASE_URL`, `NATS__URL`,
//! `ACTIONS__ADMIN_EMAIL`.

use serde::Deserialize;

/// Worker configuration.
#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// NATS configuration.
    #[serde(default)]
    pub nats: NatsSettings,

    /// Action dispatch configuration.
    pub actions: ActionSettings,

    /// Continuation sweep configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// NATS connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsSettings {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub url: String,
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
        }
    }
}

/// Settings for action dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSettings {
    /// Address the `admin` recipient selector resolves to.
    pub admin_email: String,
}

/// Settings for the continuation sweeper.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between continuation sweeps.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let nats = NatsSettings::default();
        assert_eq!(nats.url, "nats://127.0.0.1:4222");

        let scheduler = SchedulerSettings::default();
        assert_eq!(scheduler.sweep_interval_seconds, 30);
    }
}
