//! Configuration loading and data folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "SSB_DATA_FOLDER";

/// Environment variable holding the AI gateway API key
pub const GATEWAY_API_KEY_ENV: &str = "SSB_GATEWAY_API_KEY";

/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "SSB_PORT";

/// Default listen port for ssb-api
pub const DEFAULT_PORT: u16 = 5740;

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(config) = read_config_file() {
        if let Some(data_folder) = config.get("data_folder").and_then(|v| v.as_str()) {
            return PathBuf::from(data_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    get_default_data_folder()
}

/// Resolve the listen port: CLI argument, then environment, then TOML, then default
pub fn resolve_port(cli_arg: Option<u16>) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }

    if let Ok(port) = std::env::var(PORT_ENV) {
        if let Ok(port) = port.parse::<u16>() {
            return port;
        }
    }

    if let Some(config) = read_config_file() {
        if let Some(port) = config.get("port").and_then(|v| v.as_integer()) {
            if let Ok(port) = u16::try_from(port) {
                return port;
            }
        }
    }

    DEFAULT_PORT
}

/// Create the data folder (and its uploads subfolder) if missing
pub fn ensure_data_folder(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    std::fs::create_dir_all(path.join("uploads"))?;
    Ok(())
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let config_dir = if cfg!(target_os = "linux") {
        // Try ~/.config/squadsave/config.toml first, then /etc/squadsave/config.toml
        let user_config = dirs::config_dir()
            .map(|d| d.join("squadsave").join("config.toml"));
        let system_config = PathBuf::from("/etc/squadsave/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        dirs::config_dir()
            .map(|d| d.join("squadsave").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    } else {
        return Err(Error::Config("Unsupported platform".to_string()));
    };

    if config_dir.exists() {
        Ok(config_dir)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", config_dir)))
    }
}

/// Read and parse the config file, if one exists
fn read_config_file() -> Option<toml::Value> {
    let path = load_config_file().ok()?;
    let content = std::fs::read_to_string(&path).ok()?;
    toml::from_str::<toml::Value>(&content).ok()
}

/// Get OS-dependent default data folder path
fn get_default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/squadsave (or /var/lib/squadsave for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("squadsave"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/squadsave"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/squadsave
        dirs::data_dir()
            .map(|d| d.join("squadsave"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/squadsave"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\squadsave
        dirs::data_local_dir()
            .map(|d| d.join("squadsave"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\squadsave"))
    } else {
        PathBuf::from("./squadsave_data")
    }
}

/// AI gateway settings
///
/// Loaded from the `[gateway]` table of the config file; the API key only
/// ever comes from the environment so it is never written to disk.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Bearer token for the gateway, from SSB_GATEWAY_API_KEY
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
            model: "google/gemini-2.5-flash".to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl GatewayConfig {
    /// Load gateway settings from the config file and environment
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(value) = read_config_file() {
            if let Some(table) = value.get("gateway") {
                config.apply_toml(table);
            }
        }

        if let Ok(key) = std::env::var(GATEWAY_API_KEY_ENV) {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        config
    }

    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn apply_toml(&mut self, table: &toml::Value) {
        if let Some(endpoint) = table.get("endpoint").and_then(|v| v.as_str()) {
            self.endpoint = endpoint.to_string();
        }
        if let Some(model) = table.get("model").and_then(|v| v.as_str()) {
            self.model = model.to_string();
        }
        if let Some(timeout) = table.get("timeout_secs").and_then(|v| v.as_integer()) {
            if timeout > 0 {
                self.timeout_secs = timeout as u64;
            }
        }
    }
}
