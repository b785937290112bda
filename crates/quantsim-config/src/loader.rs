//! Configuration loader.

use std::path::Path;
use std::str::FromStr;

use quantsim_core::RoundingMode;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::{Config, LogFormat, LoggingConfig, QuantizationConfig, RuntimeConfig};

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse content in this format.
    pub fn parse<T: serde::de::DeserializeOwned>(&self, content: &str) -> Result<T, ConfigError> {
        match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(ConfigError::from),
            Self::Toml => toml::from_str(content).map_err(ConfigError::from),
            Self::Json => serde_json::from_str(content).map_err(ConfigError::from),
        }
    }
}

/// Configuration loader.
pub struct ConfigLoader {
    /// Config file path.
    file_path: Option<String>,

    /// Environment variable prefix.
    env_prefix: Option<String>,

    /// Default values.
    defaults: Config,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: None,
            defaults: Config::default(),
        }
    }

    /// Set the config file path.
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Set default values.
    pub fn with_defaults(mut self, defaults: Config) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load the configuration.
    pub fn load(self) -> Result<Config, ConfigError> {
        let mut config = match self.file_path {
            Some(ref path) => self.load_from_file(path)?,
            None => self.defaults.clone(),
        };

        if let Some(ref prefix) = self.env_prefix {
            apply_env_overrides(&mut config, prefix, |key| std::env::var(key).ok())?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Load from file.
    fn load_from_file(&self, path: &str) -> Result<Config, ConfigError> {
        debug!("Loading configuration from {}", path);

        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(path.to_string()));
        }

        let content = std::fs::read_to_string(path)?;

        let format = ConfigFormat::from_extension(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_string()))?;

        let config: Config = format.parse(&content)?;

        info!("Loaded configuration from {}", path);

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::EnvError(format!("{}={}: {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvError(format!(
            "{}={}: expected a boolean",
            key, value
        ))),
    }
}

/// Apply `<PREFIX>_*` overrides read through `lookup`.
pub(crate) fn apply_env_overrides<F>(
    config: &mut Config,
    prefix: &str,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        let key = format!("{}_{}", prefix, name);
        lookup(&key).map(|value| (key, value))
    };

    // Quantization overrides
    if let Some((key, val)) = var("BITWIDTH") {
        config.quantization.bitwidth = parse_env(&key, &val)?;
    }
    if let Some((key, val)) = var("ROUNDING") {
        config.quantization.rounding = parse_env::<RoundingMode>(&key, &val)?;
    }
    if let Some((key, val)) = var("SYMMETRIC") {
        config.quantization.use_symmetric = parse_bool(&key, &val)?;
    }
    if let Some((key, val)) = var("UNSIGNED_SYMMETRIC") {
        config.quantization.unsigned_symmetric = parse_bool(&key, &val)?;
    }
    if let Some((key, val)) = var("SEED") {
        config.quantization.seed = Some(parse_env(&key, &val)?);
    }

    // Runtime overrides
    if let Some((key, val)) = var("PARALLEL_THRESHOLD") {
        config.runtime.parallel_threshold = parse_env(&key, &val)?;
    }
    if let Some((key, val)) = var("NUM_THREADS") {
        config.runtime.num_threads = parse_env(&key, &val)?;
    }

    // Logging overrides
    if let Some((_, val)) = var("LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some((key, val)) = var("LOG_FORMAT") {
        config.logging.format = parse_env::<LogFormat>(&key, &val)?;
    }

    Ok(())
}

/// Load configuration from default locations.
pub fn load_default_config() -> Result<Config, ConfigError> {
    let paths = [
        "quantsim.yaml",
        "quantsim.yml",
        "quantsim.toml",
        "quantsim.json",
    ];

    for path in &paths {
        if Path::new(path).exists() {
            return ConfigLoader::new()
                .with_file(*path)
                .with_env_prefix("QUANTSIM")
                .load();
        }
    }

    ConfigLoader::new().with_env_prefix("QUANTSIM").load()
}

/// Builder for programmatic configuration.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set quantization configuration.
    pub fn quantization(mut self, config: QuantizationConfig) -> Self {
        self.config.quantization = config;
        self
    }

    /// Set runtime configuration.
    pub fn runtime(mut self, config: RuntimeConfig) -> Self {
        self.config.runtime = config;
        self
    }

    /// Set logging configuration.
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Set bit-width.
    pub fn bitwidth(mut self, bitwidth: u8) -> Self {
        self.config.quantization.bitwidth = bitwidth;
        self
    }

    /// Set rounding mode.
    pub fn rounding(mut self, rounding: RoundingMode) -> Self {
        self.config.quantization.rounding = rounding;
        self
    }

    /// Set stochastic rounding seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.quantization.seed = Some(seed);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
