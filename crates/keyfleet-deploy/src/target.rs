// ABOUTME: Deploy target descriptors and the TOML targets file.
// ABOUTME: A target is identified by (host, port) within one deploy call.

use crate::error::DeployError;
use crate::transport::Endpoint;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_port() -> u16 {
    22
}

/// One remote account a key is deployed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployTarget {
    /// Caller-assigned identifier reported back in outcomes
    pub id: String,

    /// Display name
    pub name: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote login account
    pub login: String,
}

impl DeployTarget {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        login: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: host.into(),
            port,
            login: login.into(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.login.clone())
    }

    /// Normalized (host, port) identity.
    pub fn identity(&self) -> (String, u16) {
        (self.host.trim().to_ascii_lowercase(), self.port)
    }

    /// Reject descriptors that cannot be passed safely to a remote-login client.
    pub fn validate(&self) -> std::result::Result<(), DeployError> {
        let invalid = |reason: &str| DeployError::InvalidTarget {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.host.trim().is_empty() {
            return Err(invalid("host is empty"));
        }
        if self.host.starts_with('-') || self.host.chars().any(|c| c.is_whitespace() || c == '@')
        {
            return Err(invalid("host contains forbidden characters"));
        }
        if self.port == 0 {
            return Err(invalid("port must be between 1 and 65535"));
        }
        if self.login.is_empty() {
            return Err(invalid("login is empty"));
        }
        if self.login.starts_with('-')
            || self
                .login
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == '@')
        {
            return Err(invalid("login contains forbidden characters"));
        }
        Ok(())
    }
}

/// Contents of a targets file: a list of `[[targets]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetList {
    #[serde(default)]
    pub targets: Vec<DeployTarget>,
}

impl TargetList {
    /// Load targets from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read targets from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse targets from {}", path.display()))
    }
}
