//! Bridge settings – reads/writes `~/.mapbridge/bridge.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use mapbridge_runtime::BridgeConfig;

/// Persisted settings of the `mapbridge` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// WebSocket port of the gateway.
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// Engine parameter file, read at start and overwritten at shutdown.
    #[serde(default = "default_parameters_file")]
    pub parameters_file: PathBuf,

    #[serde(default)]
    pub delete_memory_on_start: bool,

    /// Capacity of every bus lane and outbound channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_gateway_port() -> u16 {
    9090
}
fn default_parameters_file() -> PathBuf {
    mapbridge_dir(&home()).join("parameters.toml")
}
fn default_event_capacity() -> usize {
    mapbridge_middleware::bus::DEFAULT_CAPACITY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_port: default_gateway_port(),
            parameters_file: default_parameters_file(),
            delete_memory_on_start: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Settings {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            parameters_file: self.parameters_file.clone(),
            delete_memory_on_start: self.delete_memory_on_start,
            event_capacity: self.event_capacity,
        }
    }
}

fn home() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn mapbridge_dir(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mapbridge")
}

/// Return the path to `~/.mapbridge/bridge.toml`.
pub fn settings_path() -> PathBuf {
    settings_path_for_home(&home())
}

pub(crate) fn settings_path_for_home(home: &str) -> PathBuf {
    mapbridge_dir(home).join("bridge.toml")
}

/// Load settings from disk with environment overrides applied. `None` when
/// the file does not exist.
pub fn load() -> Result<Option<Settings>, String> {
    let mut settings = load_from(&settings_path())?;
    if let Some(settings) = settings.as_mut() {
        apply_env_overrides(settings);
    }
    Ok(settings)
}

/// Load settings from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Settings>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse settings: {}", e))
}

/// Apply `MAPBRIDGE_*` environment variable overrides.
///
/// | Variable | Field |
/// |---|---|
/// | `MAPBRIDGE_GATEWAY_PORT` | `gateway_port` |
/// | `MAPBRIDGE_PARAMETERS_FILE` | `parameters_file` |
/// | `MAPBRIDGE_DELETE_MEMORY_ON_START` | `delete_memory_on_start` |
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(v) = std::env::var("MAPBRIDGE_GATEWAY_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        settings.gateway_port = port;
    }
    if let Ok(v) = std::env::var("MAPBRIDGE_PARAMETERS_FILE") {
        settings.parameters_file = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("MAPBRIDGE_DELETE_MEMORY_ON_START")
        && let Ok(flag) = v.parse::<bool>()
    {
        settings.delete_memory_on_start = flag;
    }
}

/// Save settings, creating `~/.mapbridge/` if necessary.
pub fn save(settings: &Settings) -> Result<(), String> {
    save_to(settings, &settings_path())
}

pub(crate) fn save_to(settings: &Settings, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set settings directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write settings at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write settings at {}: {}", path.display(), e))?;
    Ok(())
}
