//! Source host connection settings.

use serde::Deserialize;

use crate::error::MigrationError;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH connection settings for a live cPanel source, parsed from a job's
/// `source_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceHost {
    pub host: String,
    pub ssh_user: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub ssh_key_path: Option<String>,
    #[serde(default)]
    pub known_hosts_file: Option<String>,
    /// Where account home directories live on the source, when it differs
    /// from the engine default.
    #[serde(default)]
    pub cpanel_home_root: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl SourceHost {
    pub fn from_config(config: &serde_json::Value) -> Result<Self, MigrationError> {
        let source: SourceHost = serde_json::from_value(config.clone())
            .map_err(|e| MigrationError::validation(format!("invalid source config: {e}")))?;
        if source.host.trim().is_empty() {
            return Err(MigrationError::validation("source host must not be empty"));
        }
        if source.ssh_user.trim().is_empty() {
            return Err(MigrationError::validation("ssh user must not be empty"));
        }
        Ok(source)
    }
}
