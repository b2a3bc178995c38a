use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Database;
use crate::error::CuratorError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_ORGANISM: &str = "Homo sapiens";
pub const DEFAULT_LIMIT: u32 = 20;

/// `curator.json`, looked up in the working directory first and the user
/// config directory second. Every field is optional; a missing file means
/// built-in defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub database: Option<Database>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub database: Database,
    pub organism: String,
    pub limit: u32,
    pub year: Option<String>,
    pub profile: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            database: Database::Sra,
            organism: DEFAULT_ORGANISM.to_string(),
            limit: DEFAULT_LIMIT,
            year: None,
            profile: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the effective configuration. An explicit path must exist; the
    /// default lookup falls through to built-in defaults when no file is
    /// found.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CuratorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(ResolvedConfig::default()),
            },
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CuratorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CuratorError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = ResolvedConfig::default();
        ResolvedConfig {
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            database: config.database.unwrap_or(defaults.database),
            organism: config.organism.unwrap_or(defaults.organism),
            limit: config.limit.unwrap_or(defaults.limit).min(100),
            year: config.year,
            profile: config.profile,
        }
    }

    fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from("curator.json");
        if local.exists() {
            return Some(local);
        }
        let dirs = directories::ProjectDirs::from("io", "hox", "sra-curator")?;
        let global = dirs.config_dir().join("curator.json");
        global.exists().then_some(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.database, Database::Sra);
        assert_eq!(resolved.organism, DEFAULT_ORGANISM);
        assert_eq!(resolved.limit, DEFAULT_LIMIT);
        assert!(resolved.year.is_none());
    }

    #[test]
    fn limit_is_capped() {
        let config = Config {
            limit: Some(500),
            ..Config::default()
        };
        assert_eq!(ConfigLoader::resolve_config(config).limit, 100);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let config = Config {
            base_url: Some("http://curator.internal:8000/".to_string()),
            ..Config::default()
        };
        assert_eq!(
            ConfigLoader::resolve_config(config).base_url,
            "http://curator.internal:8000"
        );
    }
}
