//! Application configuration for SkyDAG.
//!
//! User config lives at `~/.skydag/skydag.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyDagError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "skydag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".skydag";

// ---------------------------------------------------------------------------
// Config structs (matching skydag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site-level defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Cluster shared storage root where the run directory is created.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: String,

    /// Directory holding the ephemeris data files.
    #[serde(default = "default_ephemeris_dir")]
    pub ephemeris_dir: String,

    /// Replica-location server the gather stage queries.
    #[serde(default = "default_rls_server")]
    pub rls_server: String,

    /// Calibration type of the input data.
    #[serde(default = "default_calibration")]
    pub calibration: String,

    /// Calibration version of the input data.
    #[serde(default = "default_calibration_version")]
    pub calibration_version: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            shared_dir: default_shared_dir(),
            ephemeris_dir: default_ephemeris_dir(),
            rls_server: default_rls_server(),
            calibration: default_calibration(),
            calibration_version: default_calibration_version(),
        }
    }
}

fn default_shared_dir() -> String {
    ".".into()
}
fn default_ephemeris_dir() -> String {
    ".".into()
}
fn default_rls_server() -> String {
    "rls://hydra.phys.uwm.edu".into()
}
fn default_calibration() -> String {
    "Funky".into()
}
fn default_calibration_version() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.skydag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SkyDagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.skydag/skydag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SkyDagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SkyDagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SkyDagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SkyDagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SkyDagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("shared_dir"));
        assert!(toml_str.contains("rls://hydra.phys.uwm.edu"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.calibration, "Funky");
        assert_eq!(parsed.defaults.calibration_version, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
shared_dir = "/data/shared"
calibration = "V03"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.shared_dir, "/data/shared");
        assert_eq!(config.defaults.calibration, "V03");
        assert_eq!(config.defaults.ephemeris_dir, ".");
        assert_eq!(config.defaults.calibration_version, 3);
    }
}
