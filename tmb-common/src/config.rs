//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file, checked after the CLI argument.
pub const CONFIG_ENV_VAR: &str = "TMB_CONFIG";

/// Top-level service configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Configured translators; each binds a name to one vendor account.
    #[serde(default)]
    pub translators: Vec<TranslatorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Externally reachable base URL, used to build vendor callback URLs
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5780".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    data_dir().join("tmb.db")
}

/// Vendor kind behind a configured translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Lilt,
    Textmaster,
}

impl VendorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorKind::Lilt => "lilt",
            VendorKind::Textmaster => "textmaster",
        }
    }
}

/// One configured translator account.
///
/// `api_secret` and `project_template` are TextMaster-only; `memory_id` is
/// Lilt-only. Validation happens in [`Config::validate`], not in serde.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    /// Local translator name; jobs reference translators by this name
    pub name: String,
    pub vendor: VendorKind,
    /// Vendor API base URL, without trailing slash
    pub service_url: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub project_template: Option<String>,
    #[serde(default)]
    pub memory_id: Option<i64>,
}

impl Config {
    /// Load configuration following the resolution priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `TMB_CONFIG` environment variable
    /// 3. User config directory (`~/.config/tmb/config.toml`)
    /// 4. `/etc/tmb/config.toml`
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let path = resolve_config_file(cli_arg)?;
        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML configuration string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for translator in &self.translators {
            if translator.name.is_empty() {
                return Err(Error::Config("translator name must not be empty".into()));
            }
            if self
                .translators
                .iter()
                .filter(|t| t.name == translator.name)
                .count()
                > 1
            {
                return Err(Error::Config(format!(
                    "duplicate translator name: {}",
                    translator.name
                )));
            }
            if translator.vendor == VendorKind::Textmaster && translator.api_secret.is_none() {
                return Err(Error::Config(format!(
                    "translator {} requires api_secret",
                    translator.name
                )));
            }
        }
        Ok(())
    }
}

fn resolve_config_file(cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = dirs::config_dir().map(|d| d.join("tmb").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    let system_config = PathBuf::from("/etc/tmb/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tmb"))
        .unwrap_or_else(|| PathBuf::from("./tmb_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = Config::parse(
            r#"
            [[translators]]
            name = "lilt-main"
            vendor = "lilt"
            service_url = "https://lilt.example/2"
            api_key = "key"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5780");
        assert_eq!(config.translators.len(), 1);
        assert_eq!(config.translators[0].vendor, VendorKind::Lilt);
    }

    #[test]
    fn textmaster_requires_secret() {
        let err = Config::parse(
            r#"
            [[translators]]
            name = "tm"
            vendor = "textmaster"
            service_url = "https://tm.example"
            api_key = "key"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Config::parse(
            r#"
            [[translators]]
            name = "a"
            vendor = "lilt"
            service_url = "https://x"
            api_key = "k"

            [[translators]]
            name = "a"
            vendor = "lilt"
            service_url = "https://y"
            api_key = "k"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
