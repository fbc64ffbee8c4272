use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Pool sizes and the quality floor are positive
/// - Item selection indices are 1-based and non-empty when given
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.orchestrator.max_concurrent_transfers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_transfers cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.assemble_limit() == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_assembles cannot be 0".to_string(),
        ));
    }
    if config.acquisition.probe.quality_floor_width == 0 {
        return Err(ConfigError::ValidationError(
            "acquisition.quality_floor_width cannot be 0".to_string(),
        ));
    }
    if config.acquisition.probe.sample_segments == 0 {
        return Err(ConfigError::ValidationError(
            "acquisition.sample_segments cannot be 0".to_string(),
        ));
    }
    if config.acquisition.start_index == 0 {
        return Err(ConfigError::ValidationError(
            "acquisition.start_index is 1-based and cannot be 0".to_string(),
        ));
    }
    if let Some(items) = &config.acquisition.items {
        if items.is_empty() {
            return Err(ConfigError::ValidationError(
                "acquisition.items cannot be an empty list".to_string(),
            ));
        }
        if items.contains(&0) {
            return Err(ConfigError::ValidationError(
                "acquisition.items are 1-based and cannot contain 0".to_string(),
            ));
        }
    }

    Ok(())
}
