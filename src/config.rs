//! Layered settings: built-in defaults, then `<project-root>/.rsw.toml`, then
//! `RSW_*` environment variables, then command-line flags.

use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StopwatchError};

pub const PROJECT_CONFIG_FILE: &str = ".rsw.toml";
pub const DEFAULT_TOOL: &str = "mvn";
pub const DEFAULT_OUTPUT_DIR: &str = "target";
pub const DEFAULT_HISTORY_FILE: &str = ".build-history.json";
pub const DEFAULT_CACHE_WINDOW_MINUTES: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub tool: String,
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub history_file: PathBuf,
    pub cache_window: Duration,
    pub persist: bool,
    pub echo_output: bool,
}

/// Keys accepted in `.rsw.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub tool: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub cache_window_minutes: Option<u64>,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub tool: Option<String>,
    pub project_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub no_history: bool,
    pub quiet: bool,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let parsed = toml::from_str(&content).map_err(|e| StopwatchError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!("loaded project config from {}", path.display());
        Ok(Some(parsed))
    }
}

impl Config {
    pub fn load(overrides: Overrides) -> Result<Self> {
        Self::load_with_env(overrides, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(overrides: Overrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_root = match overrides.project_root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let file = ConfigFile::load(&project_root.join(PROJECT_CONFIG_FILE))?.unwrap_or_default();

        let tool = overrides
            .tool
            .or_else(|| env("RSW_TOOL"))
            .or(file.tool)
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let output_dir = overrides
            .output_dir
            .or_else(|| env("RSW_OUTPUT_DIR").map(PathBuf::from))
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let history_file = overrides
            .history_file
            .or_else(|| env("RSW_HISTORY_FILE").map(PathBuf::from))
            .or(file.history_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE));
        let minutes = file.cache_window_minutes.unwrap_or(DEFAULT_CACHE_WINDOW_MINUTES);

        Ok(Config {
            tool,
            output_dir: project_root.join(output_dir),
            history_file: project_root.join(history_file),
            project_root,
            cache_window: Duration::from_secs(minutes.saturating_mul(60)),
            persist: !overrides.no_history,
            echo_output: !overrides.quiet,
        })
    }
}
