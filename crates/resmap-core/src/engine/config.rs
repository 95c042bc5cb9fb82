use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The attribute always carried over from input particles to output particles.
pub const ALWAYS_KEPT_ATTRIBUTE: &str = "chain";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings of a resolution transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingConfig {
    /// Particle attributes copied from the input particles onto the output particles.
    /// Always starts with `chain`.
    pub attribute_keep: Vec<String>,
    /// Drop molecules for which no mapping collection exists instead of failing.
    pub delete_unknown: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            attribute_keep: normalize_attribute_keep(Vec::new()),
            delete_unknown: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingConfigFile {
    #[serde(default)]
    attribute_keep: Vec<String>,
    #[serde(default)]
    delete_unknown: bool,
}

impl MappingConfig {
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: MappingConfigFile = toml::from_str(content).map_err(|e| ConfigError::Toml {
            path: origin.to_path_buf(),
            source: e,
        })?;
        Ok(MappingConfigBuilder::new()
            .attribute_keep(file.attribute_keep)
            .delete_unknown(file.delete_unknown)
            .build())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content, path)
    }
}

fn normalize_attribute_keep(attributes: Vec<String>) -> Vec<String> {
    let mut keep = vec![ALWAYS_KEPT_ATTRIBUTE.to_string()];
    for attribute in attributes {
        if !keep.contains(&attribute) {
            keep.push(attribute);
        }
    }
    keep
}

#[derive(Default)]
pub struct MappingConfigBuilder {
    attribute_keep: Option<Vec<String>>,
    delete_unknown: Option<bool>,
}

impl MappingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute_keep<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_keep = Some(attributes.into_iter().map(Into::into).collect());
        self
    }
    pub fn delete_unknown(mut self, delete: bool) -> Self {
        self.delete_unknown = Some(delete);
        self
    }

    pub fn build(self) -> MappingConfig {
        MappingConfig {
            attribute_keep: normalize_attribute_keep(self.attribute_keep.unwrap_or_default()),
            delete_unknown: self.delete_unknown.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn chain_is_always_kept_first_and_once() {
        let config = MappingConfigBuilder::new()
            .attribute_keep(["resid", "chain", "resname", "resid"])
            .build();
        assert_eq!(config.attribute_keep, vec!["chain", "resid", "resname"]);
        assert!(!config.delete_unknown);
    }

    #[test]
    fn default_config_keeps_only_chain() {
        assert_eq!(MappingConfig::default().attribute_keep, vec!["chain"]);
        assert_eq!(MappingConfigBuilder::new().build(), MappingConfig::default());
    }

    #[test]
    fn load_reads_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "attribute_keep = [\"resid\", \"position\"]").unwrap();
        writeln!(file, "delete_unknown = true").unwrap();

        let config = MappingConfig::load(file.path()).unwrap();

        assert_eq!(config.attribute_keep, vec!["chain", "resid", "position"]);
        assert!(config.delete_unknown);
    }

    #[test]
    fn load_reports_missing_file() {
        let result = MappingConfig::load(Path::new("/nonexistent/mapping.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = MappingConfig::from_toml_str("keep_everything = true", Path::new("inline"));
        match result {
            Err(ConfigError::Toml { path, .. }) => assert_eq!(path, PathBuf::from("inline")),
            other => panic!("expected a TOML error, got {other:?}"),
        }
    }
}
