//! Configuration file handling

use std::path::{Path, PathBuf};

use dbmlkit_core::Target;
use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "dbmlkit.toml";

/// Configuration for dbmlkit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Schema file paths or patterns
    #[serde(default)]
    pub schema: Vec<String>,

    /// Directory receiving rendered files
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Targets to render (sql, dbml, json)
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
}

fn default_out_dir() -> String {
    "out".to_string()
}

fn default_targets() -> Vec<String> {
    vec!["sql".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: Vec::new(),
            out_dir: default_out_dir(),
            targets: default_targets(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).into_diagnostic()?;
        config.parsed_targets()?;
        Ok(config)
    }

    /// Try to find and load dbmlkit.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE);
            if config_path.exists() {
                tracing::info!(path = %config_path.display(), "using configuration");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(
        mut self,
        files: &[PathBuf],
        out_dir: &Option<PathBuf>,
        targets: &[Target],
    ) -> Self {
        if !files.is_empty() {
            self.schema = files.iter().map(|p| p.display().to_string()).collect();
        }

        if let Some(dir) = out_dir {
            self.out_dir = dir.display().to_string();
        }

        if !targets.is_empty() {
            self.targets = targets.iter().map(|t| t.to_string()).collect();
        }

        self
    }

    pub fn parsed_targets(&self) -> Result<Vec<Target>> {
        self.targets
            .iter()
            .map(|t| t.parse::<Target>().map_err(|e| miette::miette!(e)))
            .collect()
    }
}
