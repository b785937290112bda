//! Quantsim configuration management.
//!
//! This crate loads and validates the settings the quantization simulator
//! runs with. It supports YAML, TOML, and JSON configuration files, as well
//! as environment variable overrides, and installs the tracing subscriber.
//!
//! # Example
//!
//! ```rust,ignore
//! use quantsim_config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("quantsim.yaml")
//!     .with_env_prefix("QUANTSIM")
//!     .load()?;
//!
//! quantsim_config::logging::init_tracing(&config.logging)?;
//! let sim = config.build_sim::<f32>()?;
//! ```

pub mod error;
pub mod loader;
pub mod logging;
pub mod quantization;
pub mod validation;

pub use error::ConfigError;
pub use loader::{ConfigBuilder, ConfigFormat, ConfigLoader};
pub use logging::{LogFormat, LoggingConfig};
pub use quantization::{QuantizationConfig, RuntimeConfig};

use quantsim_core::Element;
use quantsim_tensor::{SimOptions, TensorQuantizationSim};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Quantization parameters.
    #[validate(nested)]
    #[serde(default)]
    pub quantization: QuantizationConfig,

    /// Execution settings.
    #[validate(nested)]
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration.
    #[validate(nested)]
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Create a new configuration from file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::new().with_env_prefix("QUANTSIM").load()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        <Self as Validate>::validate(self).map_err(ConfigError::from)?;
        validation::validate_config(self)
    }

    /// Simulator options described by this configuration.
    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            parallel_threshold: self.runtime.parallel_threshold,
            num_threads: self.runtime.num_threads,
            seed: self.quantization.seed,
            unsigned_symmetric: self.quantization.unsigned_symmetric,
        }
    }

    /// Build a simulator for element type `T`.
    pub fn build_sim<T: Element>(&self) -> Result<TensorQuantizationSim<T>, ConfigError> {
        Ok(TensorQuantizationSim::with_options(self.sim_options())?)
    }
}
