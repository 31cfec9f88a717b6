//! Main application configuration
//!
//! This module defines the configuration structures for the pairwise-lobby
//! service, including environment variable and TOML file loading, and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub simulation: SimulationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health and metrics endpoints
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Maximum time a player waits for a counterpart, in milliseconds
    pub max_wait_time_ms: u64,
}

/// Settings for the built-in load simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Players spawned per round
    pub players: usize,
    /// Number of rounds (ignored when serving)
    pub rounds: usize,
    /// Pause between rounds in milliseconds
    pub round_interval_ms: u64,
    /// Every n-th player cancels right after queueing (0 disables)
    pub cancel_every: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pairwise-lobby".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            max_wait_time_ms: 5_000,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            players: 10,
            rounds: 1,
            round_interval_ms: 1_000,
            cancel_every: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("METRICS_PORT") {
            self.service.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(wait_time) = env::var("MAX_WAIT_TIME_MS") {
            self.matchmaking.max_wait_time_ms = wait_time
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_WAIT_TIME_MS value: {}", wait_time))?;
        }

        // Simulation settings
        if let Ok(players) = env::var("SIMULATION_PLAYERS") {
            self.simulation.players = players
                .parse()
                .map_err(|_| anyhow!("Invalid SIMULATION_PLAYERS value: {}", players))?;
        }
        if let Ok(rounds) = env::var("SIMULATION_ROUNDS") {
            self.simulation.rounds = rounds
                .parse()
                .map_err(|_| anyhow!("Invalid SIMULATION_ROUNDS value: {}", rounds))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the maximum player wait as Duration
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_millis(self.matchmaking.max_wait_time_ms)
    }

    /// Get the pause between simulation rounds as Duration
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.simulation.round_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }
    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.matchmaking.max_wait_time_ms == 0 {
        return Err(anyhow!("Max wait time must be greater than 0"));
    }

    if config.simulation.players == 0 {
        return Err(anyhow!("Simulation needs at least one player"));
    }
    if config.simulation.rounds == 0 {
        return Err(anyhow!("Simulation needs at least one round"));
    }

    Ok(())
}
