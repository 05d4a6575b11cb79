use std::path::Path;

use serde_json::Value;

use crate::errors::{ConfigError, Result};
use crate::model::GeneratorConfig;

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Parse a configuration document into a JSON value, whatever its format.
///
/// TOML documents are converted so both formats share the same structural
/// validation.
pub fn parse_config_str(contents: &str, format: ConfigFormat) -> Result<Value> {
    match format {
        ConfigFormat::Json => Ok(serde_json::from_str(contents)?),
        ConfigFormat::Toml => {
            let table: toml::Value = toml::from_str(contents)?;
            Ok(serde_json::to_value(table)?)
        }
    }
}

/// Read a configuration file as a JSON value.
pub fn load_config_value(path: &Path) -> Result<Value> {
    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;
    parse_config_str(&contents, format)
}

/// Read and deserialize a configuration file without semantic validation.
pub fn load_config(path: &Path) -> Result<GeneratorConfig> {
    let value = load_config_value(path)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_agree() {
        let json = parse_config_str(
            r#"{"generation_settings": {"mode": "minimalistic", "max_depth": 3}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let toml = parse_config_str(
            "[generation_settings]\nmode = \"minimalistic\"\nmax_depth = 3\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(json, toml);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = ConfigFormat::from_path(Path::new("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }
}
