// ABOUTME: Deployment configuration for keyfleet.
// ABOUTME: Loaded from TOML file with sensible defaults.

use crate::error::DeployError;
use anyhow::{bail, Context, Result};
use keyfleet_keys::{DEFAULT_KEY_BITS, MAX_KEY_BITS, MIN_KEY_BITS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// SSH client binary used for remote commands
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    /// Private key passed to ssh with -i; ssh's own defaults apply when unset
    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// ssh ConnectTimeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a single remote command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Budget for one target (probe plus install), counted from when it starts
    #[serde(default = "default_target_deadline_secs")]
    pub target_deadline_secs: u64,

    /// Budget for a whole batch; unlimited when unset
    #[serde(default)]
    pub batch_deadline_secs: Option<u64>,

    /// Maximum number of targets contacted at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Modulus size used by `keyfleet keygen` when --bits is not given
    #[serde(default = "default_key_bits")]
    pub default_key_bits: usize,
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_target_deadline_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    16
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            ssh_binary: default_ssh_binary(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            target_deadline_secs: default_target_deadline_secs(),
            batch_deadline_secs: None,
            max_concurrency: default_max_concurrency(),
            default_key_bits: default_key_bits(),
        }
    }
}

impl DeployConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: DeployConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Get the default config file path (~/.config/keyfleet/config.toml)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("keyfleet");
        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default path, or fall back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values that would stall or disable deployment
    pub fn validate(&self) -> Result<()> {
        if self.ssh_binary.trim().is_empty() {
            bail!("ssh_binary must not be empty");
        }
        if self.connect_timeout_secs == 0 {
            bail!("connect_timeout_secs must be greater than zero");
        }
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.default_key_bits) {
            bail!(
                "default_key_bits must be between {MIN_KEY_BITS} and {MAX_KEY_BITS}, got {}",
                self.default_key_bits
            );
        }
        self.limits().validate()?;
        Ok(())
    }

    /// Timing and concurrency limits for the orchestrator
    pub fn limits(&self) -> DeployLimits {
        DeployLimits {
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            target_deadline: Duration::from_secs(self.target_deadline_secs),
            batch_deadline: self.batch_deadline_secs.map(Duration::from_secs),
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Limits applied by [`crate::Deployer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployLimits {
    pub command_timeout: Duration,
    pub target_deadline: Duration,
    pub batch_deadline: Option<Duration>,
    pub max_concurrency: usize,
}

impl Default for DeployLimits {
    fn default() -> Self {
        DeployConfig::default().limits()
    }
}

impl DeployLimits {
    pub fn validate(&self) -> std::result::Result<(), DeployError> {
        if self.max_concurrency == 0 {
            return Err(DeployError::InvalidLimits(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(DeployError::InvalidLimits(
                "command timeout must be greater than zero".to_string(),
            ));
        }
        if self.target_deadline.is_zero() {
            return Err(DeployError::InvalidLimits(
                "target deadline must be greater than zero".to_string(),
            ));
        }
        if self.batch_deadline.is_some_and(|d| d.is_zero()) {
            return Err(DeployError::InvalidLimits(
                "batch deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
