//! CLI configuration and settings management

use crate::{CliError, Result};
use rf_core::diagnostics::DiagnosticTemplate;
use rf_interpret::StageOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "refine.toml";

/// CLI configuration loaded from `refine.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Limits and switches handed to the staged evaluator
    pub staging: StageOptions,

    /// How results and diagnostics are printed
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Residual program rendered as source-like text
    #[default]
    Text,
    /// Residual AST, constraint and diagnostics as one JSON document
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default format of `stage` output
    pub format: OutputFormat,

    /// Print the result constraint after the residual program
    pub show_constraint: bool,

    /// Template used for warnings and errors on stderr
    pub diagnostics: DiagnosticTemplate,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            show_constraint: true,
            diagnostics: DiagnosticTemplate::Pretty,
        }
    }
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load_from_file(local);
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| CliError::Config(format!("Failed to write config file: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.staging.max_call_depth, 64);
        assert_eq!(config.staging.max_specializations, 64);
        assert!(config.staging.warn_unreachable);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
            [staging]
            max_call_depth = 16

            [output]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.staging.max_call_depth, 16);
        assert_eq!(config.staging.max_specializations, 64);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.show_constraint);
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = CliConfig::default();
        config.staging.warn_unreachable = false;
        config.output.diagnostics = DiagnosticTemplate::Plain;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();
        let loaded = CliConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_bad_config_is_a_config_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "staging = 3").unwrap();
        let err = CliConfig::load(Some(temp_file.path())).unwrap_err();
        assert!(matches!(err, CliError::Config(_)), "{}", err);
    }
}
