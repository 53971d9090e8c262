//! On-disk parameter file.
//!
//! The file is TOML with a single `[Core]` table:
//!
//! ```toml
//! [Core]
//! "Kp/MaxFeatures" = "400"
//! "Mem/STMSize" = "10"
//! ```
//!
//! Values are written as strings. Hand-edited integers, floats and booleans
//! are accepted and read back in their TOML spelling.

use std::fs;
use std::path::{Path, PathBuf};

use mapbridge_types::{BridgeError, ParameterTable};
use tracing::warn;

pub const CORE_SECTION: &str = "Core";

/// Durable storage for a [`ParameterTable`].
pub trait ConfigFile: Send + Sync {
    /// Human-readable location for logs.
    fn location(&self) -> String;

    fn exists(&self) -> bool;

    /// Read the stored table, `None` when there is no file yet.
    fn read(&self) -> Result<Option<ParameterTable>, BridgeError>;

    /// Replace the stored table with `table`, creating the file if needed.
    fn write(&self, table: &ParameterTable) -> Result<(), BridgeError>;
}

#[derive(Debug, Clone)]
pub struct TomlConfigFile {
    path: PathBuf,
}

impl TomlConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: impl std::fmt::Display) -> BridgeError {
        BridgeError::ConfigIo {
            path: self.path.display().to_string(),
            details: e.to_string(),
        }
    }
}

impl ConfigFile for TomlConfigFile {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<Option<ParameterTable>, BridgeError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        parse(&raw).map(Some)
    }

    fn write(&self, table: &ParameterTable) -> Result<(), BridgeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, render(table)?).map_err(|e| self.io_error(e))
    }
}

/// Parse file contents into a table.
pub fn parse(raw: &str) -> Result<ParameterTable, BridgeError> {
    let mut doc: toml::Table =
        toml::from_str(raw).map_err(|e| BridgeError::ConfigParse(e.to_string()))?;

    let section = match doc.remove(CORE_SECTION) {
        Some(toml::Value::Table(section)) => section,
        Some(_) => {
            return Err(BridgeError::ConfigParse(format!(
                "[{CORE_SECTION}] must be a table"
            )));
        }
        None => return Ok(ParameterTable::new()),
    };

    let mut table = ParameterTable::new();
    for (key, value) in section {
        match value {
            toml::Value::String(s) => {
                table.insert(key, s);
            }
            toml::Value::Integer(_)
            | toml::Value::Float(_)
            | toml::Value::Boolean(_)
            | toml::Value::Datetime(_) => {
                table.insert(key, value.to_string());
            }
            toml::Value::Array(_) | toml::Value::Table(_) => {
                warn!(%key, "skipping non-scalar parameter");
            }
        }
    }
    Ok(table)
}

/// Render a table as file contents.
pub fn render(table: &ParameterTable) -> Result<String, BridgeError> {
    let section: toml::Table = table
        .iter()
        .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
        .collect();
    let mut doc = toml::Table::new();
    doc.insert(CORE_SECTION.to_string(), toml::Value::Table(section));
    toml::to_string_pretty(&doc).map_err(|e| BridgeError::ConfigParse(e.to_string()))
}
