//! Environment configuration via `meld.toml`
//!
//! Every field maps onto an [`EnvironmentBuilder`](super::EnvironmentBuilder)
//! setting. The native settings may be written as a TOML table, which is
//! handed to the native layer as a JSON document, or as a raw string that
//! is passed through untouched.

use super::builder::DEFAULT_SETTINGS;
use meld_core::{ConfigId, FlagGroup, Flags, MeldError, MeldResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "meld.toml";

/// Native settings as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NativeSettings {
    /// Passed to the native layer as-is
    Raw(String),
    /// Serialized to JSON before it reaches the native layer
    Table(toml::Table),
}

impl Default for NativeSettings {
    fn default() -> Self {
        NativeSettings::Raw(DEFAULT_SETTINGS.to_string())
    }
}

impl NativeSettings {
    /// Settings string handed to the native layer
    pub fn to_native_string(&self) -> MeldResult<String> {
        match self {
            NativeSettings::Raw(raw) => Ok(raw.clone()),
            NativeSettings::Table(table) => serde_json::to_string(table).map_err(|e| {
                MeldError::usage(format!("settings table cannot be expressed as JSON: {}", e))
            }),
        }
    }
}

/// Environment configuration loaded from `meld.toml`.
///
/// # Example
///
/// ```toml
/// instance_name = "meld"
/// verbose_logging = false
/// # config_id = 4015371302
///
/// [settings.PIPELINE]
/// CONFIGPATH = "/etc/opt/engine"
///
/// [default_flags]
/// entity_get = ["ENTITY_DEFAULT", "ENTITY_INCLUDE_RECORD_JSON_DATA"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentConfig {
    /// Name the native layer reports this instance under
    pub instance_name: String,
    /// Native settings document
    #[serde(default)]
    pub settings: NativeSettings,
    /// Emit a debug event for every guarded call
    #[serde(default)]
    pub verbose_logging: bool,
    /// Explicit configuration id for the engine and diagnostic facets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<ConfigId>,
    /// Per-family default flag overrides, as flag or recipe names
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_flags: BTreeMap<String, Vec<String>>,
}

impl EnvironmentConfig {
    /// Read and parse a config file.
    pub fn from_file(path: impl AsRef<Path>) -> MeldResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeldError::usage(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config file contents.
    pub fn from_toml_str(content: &str) -> MeldResult<Self> {
        let config: EnvironmentConfig = toml::from_str(content)
            .map_err(|e| MeldError::usage(format!("Invalid {}: {}", CONFIG_FILE_NAME, e)))?;
        if config.instance_name.trim().is_empty() {
            return Err(MeldError::usage(format!(
                "{} must set a non-empty instance_name",
                CONFIG_FILE_NAME
            )));
        }
        Ok(config)
    }

    /// Resolve the `[default_flags]` table.
    ///
    /// # Errors
    ///
    /// `MeldError::Usage` naming the first unknown family or flag.
    pub fn flag_overrides(&self) -> MeldResult<HashMap<FlagGroup, Flags>> {
        self.default_flags
            .iter()
            .map(|(group_name, names)| {
                let group = FlagGroup::from_name(group_name).ok_or_else(|| {
                    MeldError::usage(format!("Unknown flag family '{}'", group_name))
                })?;
                let flags = Flags::parse_names(names.iter().map(String::as_str)).map_err(
                    |unknown| {
                        MeldError::usage(format!(
                            "Unknown flag '{}' in default_flags.{}",
                            unknown, group_name
                        ))
                    },
                )?;
                Ok((group, flags))
            })
            .collect()
    }

    /// Default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# meld environment configuration
#
# Name the native layer reports this instance under
instance_name = "meld"

# Emit a debug event for every guarded native call (default: false)
verbose_logging = false

# Pin the engine to a registered configuration instead of the default one
# config_id = 4015371302

# Native settings, handed to the engine as a JSON document
[settings.PIPELINE]
CONFIGPATH = "/etc/opt/engine"
RESOURCEPATH = "/opt/engine/resources"
SUPPORTPATH = "/opt/engine/data"

# Override the default flags of an operation family
# [default_flags]
# entity_get = ["ENTITY_DEFAULT", "ENTITY_INCLUDE_RECORD_JSON_DATA"]
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toml_parses() {
        let config = EnvironmentConfig::from_toml_str(EnvironmentConfig::default_toml()).unwrap();
        assert_eq!(config.instance_name, "meld");
        assert!(!config.verbose_logging);
        assert_eq!(config.config_id, None);
        assert!(config.default_flags.is_empty());

        let settings: serde_json::Value =
            serde_json::from_str(&config.settings.to_native_string().unwrap()).unwrap();
        assert_eq!(settings["PIPELINE"]["CONFIGPATH"], "/etc/opt/engine");
    }

    #[test]
    fn test_default_settings_match_builder() {
        assert_eq!(
            NativeSettings::default().to_native_string().unwrap(),
            DEFAULT_SETTINGS
        );
    }

    #[test]
    fn test_raw_settings_pass_through() {
        let config = EnvironmentConfig::from_toml_str(
            r#"
instance_name = "raw"
settings = '{"PIPELINE":{}}'
config_id = 42
"#,
        )
        .unwrap();
        assert_eq!(
            config.settings.to_native_string().unwrap(),
            r#"{"PIPELINE":{}}"#
        );
        assert_eq!(config.config_id, Some(42));
    }

    #[test]
    fn test_missing_instance_name_is_usage() {
        let err = EnvironmentConfig::from_toml_str("verbose_logging = true").unwrap_err();
        assert!(err.is_usage());

        let err = EnvironmentConfig::from_toml_str(r#"instance_name = " ""#).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_invalid_toml_is_usage() {
        let err = EnvironmentConfig::from_toml_str("instance_name = ").unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_flag_overrides() {
        let config = EnvironmentConfig::from_toml_str(
            r#"
instance_name = "flags"
[default_flags]
entity_get = ["ENTITY_INCLUDE_ENTITY_NAME", "ENTITY_INCLUDE_RECORD_JSON_DATA"]
"#,
        )
        .unwrap();
        let overrides = config.flag_overrides().unwrap();
        assert_eq!(
            overrides[&FlagGroup::EntityGet],
            Flags::ENTITY_INCLUDE_ENTITY_NAME | Flags::ENTITY_INCLUDE_RECORD_JSON_DATA
        );

        let bad = EnvironmentConfig::from_toml_str(
            r#"
instance_name = "flags"
[default_flags]
entity_get = ["NOPE"]
"#,
        )
        .unwrap();
        assert!(bad.flag_overrides().unwrap_err().message().contains("NOPE"));
    }
}
