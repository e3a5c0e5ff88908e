//! TOML policy files.

use std::path::Path;

use enrol_signal_forensic_models::ForensicConfig;

use crate::TableError;

/// Parses a policy from TOML text. Missing keys keep their defaults.
///
/// # Errors
///
/// * If the text is not valid TOML for [`ForensicConfig`]
pub fn parse_config(text: &str) -> Result<ForensicConfig, TableError> {
    Ok(toml::de::from_str(text)?)
}

/// Loads a policy file.
///
/// The result is not validated; [`ForensicConfig::validate`] does that.
///
/// # Errors
///
/// * If the file cannot be read
/// * If it is not valid TOML for [`ForensicConfig`]
pub fn load_config(path: &Path) -> Result<ForensicConfig, TableError> {
    let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&text)?;
    log::info!("Loaded forensic config from {}", path.display());
    Ok(config)
}

/// The default policy rendered as TOML.
///
/// # Errors
///
/// * If serialization fails
pub fn default_config_toml() -> Result<String, TableError> {
    Ok(toml::to_string_pretty(&ForensicConfig::default())?)
}
