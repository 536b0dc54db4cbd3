//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/exceptiongroup/exceptiongroup.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `EXCEPTIONGROUP_*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{GroupResult, KindRegistry};

/// Unified configuration for the exceptiongroup tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Colorize terminal output (NO_COLOR still wins)
    pub color: bool,
    /// Print notes below each failure in tree output
    pub show_notes: bool,
    /// Nesting depth after which tree output is elided
    pub max_depth: usize,
    /// Extra kinds: name → parent kind names
    pub kinds: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            show_notes: true,
            max_depth: 16,
            kinds: BTreeMap::new(),
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub color: Option<bool>,
    pub show_notes: Option<bool>,
    pub max_depth: Option<usize>,
    pub kinds: Option<BTreeMap<String, Vec<String>>>,
}

/// Get the XDG config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "exceptiongroup").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("exceptiongroup.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> ApplicationResult<RawSettings> {
    let content = std::fs::read_to_string(path).with_path_context("read config", path)?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e.message()),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

impl Settings {
    /// Merge overlay config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Kinds: union by name, overlay entries replace base entries
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut kinds = self.kinds.clone();
        if let Some(extra) = &overlay.kinds {
            kinds.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self {
            color: overlay.color.unwrap_or(self.color),
            show_notes: overlay.show_notes.unwrap_or(self.show_notes),
            max_depth: overlay.max_depth.unwrap_or(self.max_depth),
            kinds,
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file layered over the global one; it must exist
    #[instrument(level = "debug")]
    pub fn load(explicit: Option<&Path>) -> ApplicationResult<Self> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config, if present
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "loading global config");
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        // 3. Explicit config file
        if let Some(path) = explicit {
            current = current.merge_with(&load_raw_settings(path)?);
        }

        // 4. Environment overrides
        Self::apply_env_overrides(current)
    }

    /// Apply EXCEPTIONGROUP_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> ApplicationResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("EXCEPTIONGROUP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("color") {
            settings.color = val;
        }
        if let Ok(val) = config.get_bool("show_notes") {
            settings.show_notes = val;
        }
        if let Ok(val) = config.get_int("max_depth") {
            settings.max_depth = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("max_depth must not be negative: {}", val),
            })?;
        }

        Ok(settings)
    }

    /// Kind registry: builtins plus the configured kinds.
    pub fn registry(&self) -> GroupResult<KindRegistry> {
        let mut registry = KindRegistry::new();
        registry.declare_all(self.kinds.iter().map(|(name, parents)| (name.as_str(), parents)))?;
        Ok(registry)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> ApplicationResult<String> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })
    }
}
