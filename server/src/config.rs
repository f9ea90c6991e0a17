use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::directory::SpawnPoint;

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Path to TOML config file
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    pub generate_config: bool,

    /// Data directory for the player database
    pub data_dir: String,

    /// Close WebSocket sessions idle for this many seconds (0 = never)
    pub idle_timeout_secs: u64,

    /// Where new players spawn (loaded from [spawn] section in TOML only)
    pub spawn: SpawnConfig,
}

/// Command-line flags. Only flags actually given are layered over the file and
/// environment, so an omitted flag never masks a TOML value.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "tilesync-server", version, about = "tilesync presence and chat server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file (default: ./tilesync.toml)
    #[arg(long, env = "TILESYNC_CONFIG")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for the player database
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Close WebSocket sessions idle for this many seconds (0 = never)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

/// Default spawn point for players without a persisted position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default = "default_room_id")]
    pub room_id: String,

    #[serde(default)]
    pub row: i64,

    #[serde(default = "default_spawn_col")]
    pub col: i64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            room_id: default_room_id(),
            row: 0,
            col: default_spawn_col(),
        }
    }
}

impl From<SpawnConfig> for SpawnPoint {
    fn from(cfg: SpawnConfig) -> Self {
        SpawnPoint {
            row: cfg.row,
            col: cfg.col,
            room_id: cfg.room_id,
        }
    }
}

fn default_room_id() -> String {
    "room1".to_string()
}

fn default_spawn_col() -> i64 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./tilesync.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            idle_timeout_secs: 0,
            spawn: SpawnConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TILESYNC_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(Cli::parse()).extract()
    }

    fn figment(cli: Cli) -> Figment {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| Config::default().config);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TILESYNC_").ignore(&["config"]))
            .merge(Serialized::defaults(cli))
    }

    /// The idle timeout as a duration, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# tilesync Server Configuration
# Place this file at ./tilesync.toml or specify with --config <path>
# All settings can be overridden via environment variables (TILESYNC_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite player database
# data_dir = "./data"

# Close WebSocket sessions that send nothing for this many seconds.
# 0 keeps idle connections open indefinitely.
# idle_timeout_secs = 0

# ---- Spawn point for players without a saved position ----
# [spawn]
# room_id = "room1"
# row = 0
# col = 7
"#
    .to_string()
}
