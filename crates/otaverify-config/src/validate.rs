//! Field validation for [`VerifierConfig`].

use crate::defaults::{KNOWN_MAJOR_VERSIONS, LOG_FORMATS, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::error::{ConfigError, ConfigResult};
use crate::model::VerifierConfig;

pub(crate) fn validate(config: &VerifierConfig) -> ConfigResult<()> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&config.chunk_size) {
        return Err(ConfigError::invalid(
            "chunk_size",
            "out_of_range",
            config.chunk_size,
        ));
    }
    if !KNOWN_MAJOR_VERSIONS.contains(&config.supported_major_version) {
        return Err(ConfigError::invalid(
            "supported_major_version",
            "unknown_version",
            config.supported_major_version,
        ));
    }
    if config.log_level.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            field: "log_level",
            reason: "empty",
            value: None,
        });
    }
    if let Some(format) = &config.log_format
        && !LOG_FORMATS.contains(&format.trim())
    {
        return Err(ConfigError::invalid("log_format", "unknown_format", format));
    }
    if config
        .public_key_path
        .as_ref()
        .is_some_and(|path| path.as_os_str().is_empty())
    {
        return Err(ConfigError::InvalidField {
            field: "public_key_path",
            reason: "empty",
            value: None,
        });
    }
    Ok(())
}
