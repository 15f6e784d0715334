//! Configuration loading and music folder resolution
//!
//! Settings come from three places, highest priority first:
//! 1. Command-line arguments (clap also folds `BMA_PORT` etc. into these)
//! 2. Environment variables
//! 3. TOML config file
//!
//! followed by compiled defaults. The config file is only ever read; nothing
//! in BMA writes it back.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8008;

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Lifetime of a pairing token handed out by `/pair`
pub const DEFAULT_PAIRING_TTL_MINUTES: i64 = 60;

/// Device sessions idle longer than this are reaped
pub const DEFAULT_DEVICE_INACTIVITY_MINUTES: i64 = 10;

/// Upper bound on both minute settings (one year)
pub const MAX_SETTING_MINUTES: i64 = 525_600;

/// Period of the background device reaper
pub const DEFAULT_REAP_INTERVAL_SECONDS: u64 = 60;

/// Default log filter when neither `RUST_LOG` nor the config file sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the music folder
pub const MUSIC_FOLDER_ENV: &str = "BMA_MUSIC_FOLDER";

/// `[logging]` table of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. `info` or `bma_server=debug`
    pub level: Option<String>,
}

/// Contents of `config.toml`
///
/// Every key is optional; a missing file is equivalent to an empty one.
///
/// ```toml
/// music_folder = "/srv/music"
/// port = 8008
/// pairing_ttl_minutes = 60
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub music_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    /// Public base URL advertised to clients during pairing
    pub server_url: Option<String>,
    pub pairing_ttl_minutes: Option<i64>,
    pub device_inactivity_minutes: Option<i64>,
    pub reap_interval_seconds: Option<u64>,
    pub logging: LoggingConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub music_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub server_url: Option<String>,
}

/// Fully resolved server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Folder to scan; `None` starts the server with an empty library
    pub music_folder: Option<PathBuf>,
    pub bind_address: IpAddr,
    pub port: u16,
    pub server_url: Option<String>,
    pub pairing_ttl_minutes: i64,
    pub device_inactivity: chrono::Duration,
    pub reap_interval: std::time::Duration,
    pub log_level: String,
}

impl ServerSettings {
    /// Merge CLI overrides, environment and TOML into typed settings
    pub fn resolve(cli: CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let music_folder = resolve_music_folder(cli.music_folder.as_deref(), toml);

        let bind_address_str = cli
            .bind_address
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_address_str.parse::<IpAddr>().map_err(|e| {
            Error::Config(format!("Invalid bind address '{}': {}", bind_address_str, e))
        })?;

        let port = cli.port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let pairing_ttl_minutes = toml
            .pairing_ttl_minutes
            .unwrap_or(DEFAULT_PAIRING_TTL_MINUTES);
        check_minutes("pairing_ttl_minutes", pairing_ttl_minutes)?;

        let inactivity_minutes = toml
            .device_inactivity_minutes
            .unwrap_or(DEFAULT_DEVICE_INACTIVITY_MINUTES);
        check_minutes("device_inactivity_minutes", inactivity_minutes)?;

        let reap_interval_seconds = toml
            .reap_interval_seconds
            .unwrap_or(DEFAULT_REAP_INTERVAL_SECONDS)
            .max(1);

        let server_url = cli
            .server_url
            .or_else(|| toml.server_url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let log_level = toml
            .logging
            .level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            music_folder,
            bind_address,
            port,
            server_url,
            pairing_ttl_minutes,
            device_inactivity: chrono::Duration::minutes(inactivity_minutes),
            reap_interval: std::time::Duration::from_secs(reap_interval_seconds),
            log_level,
        })
    }
}

fn check_minutes(name: &str, minutes: i64) -> Result<()> {
    if minutes <= 0 || minutes > MAX_SETTING_MINUTES {
        return Err(Error::Config(format!(
            "{} must be between 1 and {} (got {})",
            name, MAX_SETTING_MINUTES, minutes
        )));
    }
    Ok(())
}

/// Music folder resolution, in priority order:
/// 1. Command-line argument
/// 2. `BMA_MUSIC_FOLDER` environment variable
/// 3. TOML `music_folder`
/// 4. The OS audio directory (`~/Music` on most platforms)
pub fn resolve_music_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(MUSIC_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.music_folder {
        return Some(path.clone());
    }

    // Priority 4: OS-dependent default
    dirs::audio_dir()
}

/// Locate the default config file for this platform
///
/// Linux checks `~/.config/bma/config.toml`, then `/etc/bma/config.toml`.
/// Other platforms use the user config directory only.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("bma").join("config.toml"));

    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bma/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
///
/// A missing file yields defaults with a warning; a file that exists but
/// cannot be parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load config from an explicit path, or from the platform default location
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match explicit {
        Some(path) => load_toml_config(path),
        None => match default_config_path() {
            Some(path) => load_toml_config(&path),
            None => Ok(TomlConfig::default()),
        },
    }
}
