//! Cross-field configuration checks.

use quantsim_core::RoundingMode;
use tracing::warn;

use crate::error::ConfigError;
use crate::Config;

/// Validate a configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_quantization_config(config)
}

/// Validate quantization configuration.
fn validate_quantization_config(config: &Config) -> Result<(), ConfigError> {
    let q = &config.quantization;

    // A symmetric grid needs a sign level and a magnitude level.
    if q.use_symmetric && q.bitwidth < 2 {
        return Err(ConfigError::invalid_value(
            "quantization.bitwidth",
            "symmetric encodings need at least 2 bits",
        ));
    }

    if q.unsigned_symmetric && !q.use_symmetric {
        return Err(ConfigError::invalid_value(
            "quantization.unsigned_symmetric",
            "requires use_symmetric",
        ));
    }

    if q.seed.is_some() && q.rounding != RoundingMode::Stochastic {
        warn!(
            rounding = %q.rounding,
            "quantization.seed is ignored unless rounding is stochastic"
        );
    }

    Ok(())
}
