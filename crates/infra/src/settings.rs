//! Settings loading (YAML file + environment overrides).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockval_accounting::TaxRounding;
use stockval_stock::StockConfiguration;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "STOCKVAL_CONFIG";
/// Environment variable overriding `stock.valued_origin`.
pub const VALUED_ORIGIN_ENV: &str = "STOCKVAL_VALUED_ORIGIN";
/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "stockval.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read settings file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse settings: {0}")]
    Parse(String),

    #[error("invalid value for {var}: '{value}' (expected true/false)")]
    InvalidOverride { var: &'static str, value: String },
}

/// Process settings.
///
/// ```yaml
/// stock:
///   valued_origin: true
/// tax_rounding: line
/// log_filter: "stockval=debug,info"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub stock: StockConfiguration,
    #[serde(default)]
    pub tax_rounding: TaxRounding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::NotFound {
                path: path.display().to_string(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Settings for this process: `$STOCKVAL_CONFIG`, else `./stockval.yaml`
    /// when present, else defaults; then environment overrides.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::resolve(
            std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            std::env::var(VALUED_ORIGIN_ENV).ok(),
        )
    }

    pub fn resolve(
        explicit_path: Option<PathBuf>,
        valued_origin: Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut settings = match explicit_path {
            Some(path) => Self::load(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(raw) = valued_origin {
            settings.stock.valued_origin = parse_flag(VALUED_ORIGIN_ENV, &raw)?;
        }
        Ok(settings)
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidOverride {
            var,
            value: raw.to_string(),
        }),
    }
}
