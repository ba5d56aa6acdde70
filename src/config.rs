//! Configuration management with validation and defaults.

use crate::errors::{StakehouseError, StakehouseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StakehouseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub games: GamesConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub node_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            node_id: "stakehouse-1".to_string(),
        }
    }
}

/// Game engine parameters.
///
/// `house_factor` encodes the dice house edge: the win multiplier is
/// `house_factor / target`, so a factor below 100 keeps the long-run
/// expectation in the house's favor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GamesConfig {
    pub house_factor: f64,
    pub dice_target_min: u8,
    pub dice_target_max: u8,
    pub min_bet: f64,
    pub max_bet: f64,
    /// Milliseconds between crash multiplier ticks.
    pub crash_tick_ms: u64,
    /// Multiplier increment applied per tick.
    pub crash_tick_increment: f64,
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            house_factor: 99.0,
            dice_target_min: 2,
            dice_target_max: 95,
            min_bet: 1.0,
            max_bet: 10_000.0,
            crash_tick_ms: 50,
            crash_tick_increment: 0.01,
        }
    }
}

/// Ledger configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Balance granted to accounts on first contact. Zero in production;
    /// non-zero is convenient for demo deployments.
    pub starting_balance: f64,
    /// Maximum session records retained per account in memory.
    pub max_sessions_per_account: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 0.0,
            max_sessions_per_account: 10_000,
        }
    }
}

/// Monitoring and logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_filter: "stakehouse=info,tower_http=info".to_string(),
        }
    }
}

impl StakehouseConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> StakehouseResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StakehouseError::Configuration(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| StakehouseError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for demo deployments: funded accounts, fast crash ticks.
    pub fn demo() -> Self {
        Self {
            ledger: LedgerConfig {
                starting_balance: 1_000.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> StakehouseResult<()> {
        if !(0.0..100.0).contains(&self.games.house_factor) || self.games.house_factor <= 0.0 {
            return Err(StakehouseError::Configuration(
                "house_factor must be in (0, 100)".to_string(),
            ));
        }

        if self.games.dice_target_min < 1 || self.games.dice_target_max > 99 {
            return Err(StakehouseError::Configuration(
                "dice target bounds must stay within [1, 99]".to_string(),
            ));
        }

        if self.games.dice_target_min > self.games.dice_target_max {
            return Err(StakehouseError::Configuration(
                "dice_target_min must be <= dice_target_max".to_string(),
            ));
        }

        if self.games.min_bet <= 0.0 || self.games.min_bet > self.games.max_bet {
            return Err(StakehouseError::Configuration(
                "min_bet must be positive and <= max_bet".to_string(),
            ));
        }

        if self.games.crash_tick_ms == 0 {
            return Err(StakehouseError::Configuration(
                "crash_tick_ms must be > 0".to_string(),
            ));
        }

        if self.games.crash_tick_increment <= 0.0 {
            return Err(StakehouseError::Configuration(
                "crash_tick_increment must be > 0".to_string(),
            ));
        }

        if self.ledger.starting_balance < 0.0 {
            return Err(StakehouseError::Configuration(
                "starting_balance must be >= 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn crash_tick_interval(&self) -> Duration {
        Duration::from_millis(self.games.crash_tick_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
