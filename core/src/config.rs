//! Configuration loading
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `swodl.toml` in the working directory (or an explicit path, which must exist)
//! 3. Environment variables `SWODL_<SECTION>__<KEY>`, e.g. `SWODL_ENGINE__MAX_CALL_DEPTH`
//!
//! A `.env` file is read into the environment first.

use crate::executor::EngineOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub delay_multiplier: f64,
    pub strict_output_params: bool,
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            delay_multiplier: options.delay_multiplier,
            strict_output_params: options.strict_output_params,
            max_call_depth: options.max_call_depth,
        }
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            delay_multiplier: self.delay_multiplier,
            strict_output_params: self.strict_output_params,
            max_call_depth: self.max_call_depth,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// TOML file with canned service responses
    pub mock_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with default sources only
    pub fn load() -> Result<Self> {
        Config::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    delay_multiplier: Option<f64>,
    mock_path: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override applied after every other source
    pub fn delay_multiplier(mut self, factor: Option<f64>) -> Self {
        self.delay_multiplier = factor;
        self
    }

    /// Override applied after every other source
    pub fn mock_path(mut self, path: Option<PathBuf>) -> Self {
        self.mock_path = path;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let file = match &self.config_path {
            Some(path) => config::File::from(path.clone()).required(true),
            None => config::File::with_name("swodl").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("SWODL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(factor) = self.delay_multiplier {
            config.engine.delay_multiplier = factor;
        }
        if let Some(path) = self.mock_path {
            config.services.mock_path = Some(path);
        }

        anyhow::ensure!(
            config.engine.delay_multiplier >= 0.0,
            "engine.delay_multiplier must not be negative"
        );
        anyhow::ensure!(
            config.engine.max_call_depth > 0,
            "engine.max_call_depth must be at least 1"
        );

        Ok(config)
    }
}
