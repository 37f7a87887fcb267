//! CLI command handlers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use aim_config::{AimConfig, ConfigError, LoadedConfig, Overrides, Resolver, RuntimeConfig};

pub mod config;
pub mod env;
pub mod list;
pub mod run;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit config file, replacing discovery.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load config from `--config` or by discovery.
    pub fn load(&self) -> Result<LoadedConfig> {
        let loaded = match self.config_path {
            Some(ref path) => aim_config::load_config_from(path)?,
            None => aim_config::load_config(None)?,
        };
        Ok(loaded)
    }
}

/// Selection flags shared by `run` and `env`.
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Tool to launch (name or alias); defaults to settings.default_tool
    pub tool: Option<String>,

    /// Key to use; defaults to settings.default_key
    #[arg(short, long)]
    pub key: Option<String>,

    /// Profile to use; defaults to the key's vendor
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Override the resolved model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override the request timeout handed to the tool (e.g. "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub request_timeout: Option<Duration>,
}

impl Selection {
    /// Tool name from the flag or settings.
    pub fn tool_name<'a>(&'a self, config: &'a AimConfig) -> Result<&'a str, ConfigError> {
        self.tool
            .as_deref()
            .or(config.settings.default_tool.as_deref())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::ToolNotFound {
                name: String::new(),
                available: config.tools.keys().cloned().collect(),
            })
    }

    /// Resolve and apply `--model` / `--request-timeout`.
    pub fn resolve(&self, config: &AimConfig) -> Result<RuntimeConfig, ConfigError> {
        let tool = self.tool_name(config)?;
        let resolver = Resolver::new(config);
        let mut rt = resolver.resolve(
            tool,
            self.key.as_deref().unwrap_or_default(),
            self.profile.as_deref().unwrap_or_default(),
        )?;
        resolver.apply_overrides(
            &mut rt,
            &Overrides {
                model: self.model.clone(),
                timeout: self.request_timeout,
            },
        )?;
        Ok(rt)
    }
}
