//! Invocation configuration.
//!
//! Resolved once per command with precedence flag > environment > file >
//! default. The environment layer is handled by clap (`AWS_REGION`), so
//! by the time [`Config::resolve`] runs it only sees overrides and the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{default_plugins, PluginRequirement};
use crate::session::DEFAULT_PROJECT;

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_ENGINE_BINARY: &str = "pulumi";

const CONFIG_DIR: &str = ".ploy";
const CONFIG_FILE: &str = "config.toml";
const WORKSPACES_DIR: &str = "workspaces";

/// `~/.ploy/config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub org: Option<String>,
    pub region: Option<String>,
    pub project: Option<String>,
    pub pulumi_bin: Option<PathBuf>,
    pub plugins: Option<Vec<PluginRequirement>>,
}

impl FileConfig {
    /// Read `path`, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Values given on the command line (or through their env fallbacks).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub org: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Empty when neither flag nor file names one; commands reject that
    /// before touching the engine.
    pub org: String,
    pub region: String,
    pub project: String,
    pub engine_binary: PathBuf,
    pub plugins: Vec<PluginRequirement>,
    /// Parent of the per-stack engine project directories.
    pub workspace_root: PathBuf,
}

impl Config {
    /// Load the file under `home` and merge it with `overrides`.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let home = config_home()?;
        let file = FileConfig::load(&home.join(CONFIG_FILE))?;
        Ok(Self::resolve(overrides, file, &home))
    }

    pub fn resolve(overrides: Overrides, file: FileConfig, home: &Path) -> Self {
        let org = overrides
            .org
            .or(file.org)
            .map(|org| org.trim().to_string())
            .unwrap_or_default();
        let region = non_empty(overrides.region)
            .or(non_empty(file.region))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let project = non_empty(file.project).unwrap_or_else(|| DEFAULT_PROJECT.to_string());

        Self {
            org,
            region,
            project,
            engine_binary: file
                .pulumi_bin
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_BINARY)),
            plugins: file.plugins.unwrap_or_else(default_plugins),
            workspace_root: home.join(WORKSPACES_DIR),
        }
    }
}

/// `~/.ploy`
pub fn config_home() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home.join(CONFIG_DIR))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
