// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Control-plane configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Interval between reconciler ticks
    pub tick_interval: Duration,
    /// Skip the application reconciler entirely (maintenance/debugging)
    pub disable_application_task: bool,
    /// Skip the dedicated-database reconciler entirely
    pub disable_database_task: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SKIFF_DATABASE_URL`: PostgreSQL connection string
    ///
    /// Optional (with defaults):
    /// - `SKIFF_TICK_INTERVAL_MS`: reconciler tick interval (default: 1000)
    /// - `SKIFF_DISABLE_APPLICATION_TASK`: skip the application reconciler (default: false)
    /// - `SKIFF_DISABLE_DATABASE_TASK`: skip the database reconciler (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("SKIFF_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("SKIFF_DATABASE_URL"))?;

        let tick_interval_ms: u64 = std::env::var("SKIFF_TICK_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SKIFF_TICK_INTERVAL_MS", "must be a positive integer")
            })?;
        if tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "SKIFF_TICK_INTERVAL_MS",
                "must be a positive integer",
            ));
        }

        let disable_application_task = parse_flag("SKIFF_DISABLE_APPLICATION_TASK")?;
        let disable_database_task = parse_flag("SKIFF_DISABLE_DATABASE_TASK")?;

        Ok(Self {
            database_url,
            tick_interval: Duration::from_millis(tick_interval_ms),
            disable_application_task,
            disable_database_task,
        })
    }
}

fn parse_flag(name: &'static str) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(false),
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            _ => Err(ConfigError::Invalid(name, "must be a boolean")),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
