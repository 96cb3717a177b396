//! Load a [`VerifierConfig`] from an optional JSON file and `OTAVERIFY_*` variables.
//!
//! # Design
//! - Precedence: defaults, then the file, then the environment.
//! - Relative key paths in a file resolve against the file's directory.
//! - Validation runs once on the merged result.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::VerifierConfig;
use crate::validate::validate;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "OTAVERIFY_";

const ENV_CHUNK_SIZE: &str = "OTAVERIFY_CHUNK_SIZE";
const ENV_MAJOR_VERSION: &str = "OTAVERIFY_SUPPORTED_MAJOR_VERSION";
const ENV_PUBLIC_KEY: &str = "OTAVERIFY_PUBLIC_KEY";
const ENV_LOG_LEVEL: &str = "OTAVERIFY_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "OTAVERIFY_LOG_FORMAT";

/// Load configuration using the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, an
/// override is malformed, or the merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<VerifierConfig> {
    load_with_env(path, |key| env::var(key).ok())
}

/// Load configuration, resolving overrides through `lookup`.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<VerifierConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => VerifierConfig::default(),
    };
    apply_env(&mut config, lookup)?;
    validate(&config)?;
    debug!(
        chunk_size = config.chunk_size,
        supported_major_version = config.supported_major_version,
        public_key = ?config.public_key_path,
        "configuration loaded"
    );
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<VerifierConfig> {
    let raw = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: VerifierConfig =
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if let (Some(key), Some(dir)) = (&config.public_key_path, path.parent())
        && key.is_relative()
    {
        config.public_key_path = Some(dir.join(key));
    }
    Ok(config)
}

fn apply_env<F>(config: &mut VerifierConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_CHUNK_SIZE) {
        config.chunk_size = parse_number("chunk_size", &value)?;
    }
    if let Some(value) = lookup(ENV_MAJOR_VERSION) {
        config.supported_major_version = parse_number("supported_major_version", &value)?;
    }
    if let Some(value) = lookup(ENV_PUBLIC_KEY) {
        config.public_key_path = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.log_level = value;
    }
    if let Some(value) = lookup(ENV_LOG_FORMAT) {
        config.log_format = Some(value);
    }
    Ok(())
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_an_integer", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_file_and_no_env_yields_defaults() -> ConfigResult<()> {
        assert_eq!(load_with_env(None, env_from(&[]))?, VerifierConfig::default());
        Ok(())
    }

    #[test]
    fn env_overrides_apply() -> ConfigResult<()> {
        let config = load_with_env(
            None,
            env_from(&[
                (ENV_CHUNK_SIZE, " 65536 "),
                (ENV_MAJOR_VERSION, "1"),
                (ENV_PUBLIC_KEY, "/etc/update/key.pem"),
                (ENV_LOG_LEVEL, "debug"),
                (ENV_LOG_FORMAT, "json"),
            ]),
        )?;
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.supported_major_version, 1);
        assert_eq!(
            config.public_key_path,
            Some(PathBuf::from("/etc/update/key.pem"))
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn malformed_numbers_name_the_field() {
        let result = load_with_env(None, env_from(&[(ENV_CHUNK_SIZE, "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: "chunk_size",
                reason: "not_an_integer",
                ..
            })
        ));
    }

    #[test]
    fn overrides_are_validated() {
        let result = load_with_env(None, env_from(&[(ENV_MAJOR_VERSION, "7")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: "supported_major_version",
                ..
            })
        ));
    }
}
