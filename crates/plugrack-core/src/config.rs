use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How the build step materializes a repository into the install tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    Symlink,
    Copy,
}

impl BuildStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::Copy => "copy",
        }
    }
}

impl Default for BuildStrategy {
    fn default() -> Self {
        Self::Symlink
    }
}

/// User configuration, read-only for the state core. Only `build.strategy`
/// flows into persisted state; the rest is consumed by outer layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub get: GetConfig,
    #[serde(default)]
    pub edit: EditConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub strategy: BuildStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetConfig {
    #[serde(default = "enabled")]
    pub create_skeleton_plugconf: bool,
    #[serde(default = "enabled")]
    pub fallback_git_cmd: bool,
}

impl Default for GetConfig {
    fn default() -> Self {
        Self {
            create_skeleton_plugconf: true,
            fallback_git_cmd: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditConfig {
    #[serde(default)]
    pub editor: Option<String>,
}

impl Config {
    /// Reads the configuration file, falling back to defaults when absent.
    pub fn read(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading config: {}", path.display()));
            }
        };
        toml::from_str(&content)
            .with_context(|| format!("failed parsing config: {}", path.display()))
    }
}

fn enabled() -> bool {
    true
}
