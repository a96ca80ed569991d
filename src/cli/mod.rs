pub mod apply;
pub mod console;
pub mod init;
pub mod plan;

use crate::models::{SequencerConfig, CONFIG_FILE};
use crate::Result;
use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// Where the configuration comes from
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the config file (built-in defaults are used if it is missing)
    #[arg(short, long, env = "KUBESEQ_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Manifest directory (overrides the config file)
    #[arg(short, long, env = "KUBESEQ_DIRECTORY")]
    pub directory: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the config and apply overrides.
    ///
    /// A relative `directory` in the file is resolved against the file's
    /// own location; a relative override stays relative to the working
    /// directory.
    pub fn load(&self) -> Result<SequencerConfig> {
        let mut config = SequencerConfig::load(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        if config.directory.is_relative() && self.config.exists() {
            if let Some(base) = self.config.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.directory = base.join(&config.directory);
            }
        }

        if let Some(directory) = &self.directory {
            config.directory = directory.clone();
        }

        Ok(config)
    }
}

/// Output format for summaries
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored, human-readable console output
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Serialize for the machine-readable formats; `None` for text
    pub fn render<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        match self {
            OutputFormat::Text => Ok(None),
            OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
            OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
        }
    }
}
