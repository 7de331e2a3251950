// Configuration
//
// Settings come from ~/.somnia/config.toml (optional) with CLI flags
// applied on top. Every field has a default so the service runs with no
// config file at all.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Model candidates tried in order at startup.
pub const DEFAULT_MODEL_CANDIDATES: &[&str] = &[
    "Qwen/Qwen2.5-0.5B-Instruct",
    "Qwen/Qwen2.5-1.5B-Instruct",
];

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8001";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_model_candidates")]
    pub model_candidates: Vec<String>,
    /// Skip model loading entirely and serve from the rule-based
    /// generators.
    #[serde(default)]
    pub fallback_only: bool,
    /// Skip accelerator probing.
    #[serde(default)]
    pub force_cpu: bool,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_model_candidates() -> Vec<String> {
    DEFAULT_MODEL_CANDIDATES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            model_candidates: default_model_candidates(),
            fallback_only: false,
            force_cpu: false,
        }
    }
}

impl Settings {
    /// Load from the user config file if present, defaults otherwise.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".somnia/config.toml"))
}
