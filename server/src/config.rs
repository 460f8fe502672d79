//! Server configuration loaded from TOML

use crate::model::Dashboard;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use widgetlink_shared::limits;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate user {0}")]
    DuplicateUser(String),

    #[error("Duplicate dashboard {dash_id} for user {email}")]
    DuplicateDashboard { email: String, dash_id: i32 },

    #[error("Device token {0:?} is used more than once")]
    DuplicateToken(String),
}

/// Account with its dashboards, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address hardware devices connect to
    pub hardware_listen: String,
    /// Address app clients connect to
    pub app_listen: String,
    /// Per-connection outbound frame queue depth
    pub outbound_queue: usize,
    pub users: Vec<UserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hardware_listen: "0.0.0.0:8442".into(),
            app_listen: "0.0.0.0:8443".into(),
            outbound_queue: limits::OUTBOUND_QUEUE_DEPTH,
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut emails = HashSet::new();
        let mut tokens = HashSet::new();

        for user in &self.users {
            if !emails.insert(user.email.as_str()) {
                return Err(ConfigError::DuplicateUser(user.email.clone()));
            }

            let mut dash_ids = HashSet::new();
            for dash in &user.dashboards {
                if !dash_ids.insert(dash.id) {
                    return Err(ConfigError::DuplicateDashboard {
                        email: user.email.clone(),
                        dash_id: dash.id,
                    });
                }
                for device in &dash.devices {
                    if !tokens.insert(device.token.as_str()) {
                        return Err(ConfigError::DuplicateToken(device.token.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}
