use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const ENCRYPTION_KEY_ENV: &str = "INVENTORY_ENCRYPTION_KEY";

/// Service-wide settings, loaded once at startup and shared read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Rows per page on list endpoints
    pub display_per_page: u64,
    /// Port used when an import cell cannot be read as a number
    pub default_ssh_port: i32,
    /// Web terminal host handed to the browser client
    pub web_ssh: String,
    /// Web terminal port handed to the browser client
    pub web_port: u16,
    pub server: ServerConfig,
    pub security: SecurityConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub database: String,
    pub cors_origin: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Base64 encoded 32-byte key for login-user password encryption
    pub encryption_key: Option<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            display_per_page: 20,
            default_ssh_port: 22,
            web_ssh: "127.0.0.1".to_string(),
            web_port: 8002,
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database: "inventory.db".to_string(),
            cors_origin: None,
        }
    }
}

impl InventoryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: InventoryConfig =
            toml::from_str(content).context("Failed to parse inventory configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when no path is given.
    /// The encryption key environment variable always wins over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV) {
            if !key.trim().is_empty() {
                config.security.encryption_key = Some(key.trim().to_string());
            }
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.display_per_page == 0 {
            anyhow::bail!("display_per_page must be greater than zero");
        }
        if !(1..=65535).contains(&self.default_ssh_port) {
            anyhow::bail!(
                "default_ssh_port {} is outside the valid port range",
                self.default_ssh_port
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InventoryConfig::default();
        assert_eq!(config.display_per_page, 20);
        assert_eq!(config.default_ssh_port, 22);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.database, "inventory.db");
        assert!(config.security.encryption_key.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = InventoryConfig::from_toml_str(
            r#"
display_per_page = 50
web_ssh = "10.0.0.5"

[server]
port = 8080
"#,
        )
        .expect("config should parse");

        assert_eq!(config.display_per_page, 50);
        assert_eq!(config.web_ssh, "10.0.0.5");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.database, "inventory.db");
        assert_eq!(config.default_ssh_port, 22);
    }

    #[test]
    fn test_rejects_zero_page_size() {
        assert!(InventoryConfig::from_toml_str("display_per_page = 0").is_err());
    }

    #[test]
    fn test_rejects_invalid_default_port() {
        assert!(InventoryConfig::from_toml_str("default_ssh_port = 70000").is_err());
    }
}
