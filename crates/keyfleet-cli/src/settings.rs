// ABOUTME: Resolves the effective DeployConfig from file, environment and flags.
// ABOUTME: Also maps the --converter choice to a PPK encoding strategy.

use anyhow::{Context, Result};
use clap::ValueEnum;
use keyfleet_deploy::DeployConfig;
use keyfleet_keys::{LegacyEncoder, NativePpkEncoder, PreferExternal, PuttygenConverter};
use std::path::{Path, PathBuf};

/// Load the config at `path`, or the default location when none is given.
///
/// An explicit path must exist; the default path may be absent.
pub fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    match path {
        Some(path) => DeployConfig::load(path),
        None => DeployConfig::load_or_default().context("Failed to load default config"),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub ssh_binary: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub max_concurrency: Option<usize>,
    pub target_deadline_secs: Option<u64>,
    pub batch_deadline_secs: Option<u64>,
}

impl Overrides {
    /// Apply the set values to `config` and re-validate the result.
    pub fn apply(self, mut config: DeployConfig) -> Result<DeployConfig> {
        if let Some(ssh_binary) = self.ssh_binary {
            config.ssh_binary = ssh_binary;
        }
        if let Some(identity_file) = self.identity_file {
            config.identity_file = Some(identity_file);
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(secs) = self.target_deadline_secs {
            config.target_deadline_secs = secs;
        }
        if let Some(secs) = self.batch_deadline_secs {
            config.batch_deadline_secs = Some(secs);
        }
        config.validate().context("Invalid deploy settings")?;
        Ok(config)
    }
}

/// How `keygen` produces the PPK file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConverterChoice {
    /// Built-in PPK v2 writer
    Native,
    /// Require PuTTY's puttygen
    Puttygen,
    /// puttygen when installed, otherwise the built-in writer
    #[default]
    Auto,
}

impl ConverterChoice {
    pub fn encoder(self) -> Box<dyn LegacyEncoder> {
        match self {
            ConverterChoice::Native => Box::new(NativePpkEncoder),
            ConverterChoice::Puttygen => Box::new(PuttygenConverter::default()),
            ConverterChoice::Auto => Box::new(PreferExternal::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = Overrides {
            ssh_binary: Some("/usr/local/bin/ssh".to_string()),
            identity_file: Some(PathBuf::from("/keys/deploy")),
            max_concurrency: Some(4),
            target_deadline_secs: Some(15),
            batch_deadline_secs: Some(120),
        };

        let config = overrides
            .apply(DeployConfig::default())
            .expect("should apply");
        assert_eq!(config.ssh_binary, "/usr/local/bin/ssh");
        assert_eq!(config.identity_file, Some(PathBuf::from("/keys/deploy")));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.target_deadline_secs, 15);
        assert_eq!(config.batch_deadline_secs, Some(120));
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let config = Overrides::default()
            .apply(DeployConfig::default())
            .expect("should apply");
        assert_eq!(config, DeployConfig::default());
    }

    #[test]
    fn test_overrides_are_validated() {
        let overrides = Overrides {
            max_concurrency: Some(0),
            ..Overrides::default()
        };
        assert!(overrides.apply(DeployConfig::default()).is_err());
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_concurrency = 3\n").unwrap();

        let config = load_config(Some(&path)).expect("should load");
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.ssh_binary, "ssh");
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_converter_names() {
        assert_eq!(ConverterChoice::Native.encoder().name(), "native");
        assert_eq!(ConverterChoice::Puttygen.encoder().name(), "puttygen");
        assert_eq!(ConverterChoice::Auto.encoder().name(), "auto");
    }
}
