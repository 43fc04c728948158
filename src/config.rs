use std::{fs, path::Path};

use serde::Deserialize;

use crate::{MailflowError, Result, workflow::Scope};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// backend api config
    pub api: ApiConfig,
    /// workflow editing config
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// api base url, the company id and resource path are appended to it
    pub base_url: String,
    /// request timeout in milliseconds, defaults to 30000
    pub timeout_ms: u64,
    /// page size used when listing workflows, defaults to 10
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// which actions the completeness check covers
    pub completeness_scope: Scope,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_ms: 30_000,
            page_size: 10,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| MailflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.api.base_url.is_empty() {
            return Err(MailflowError::Config("api.base_url must not be empty".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use crate::{Config, workflow::Scope};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        [api]
        base_url = "https://mail.example.com/api"
        timeout_ms = 5000
        page_size = 25

        [workflow]
        completeness_scope = "full"
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://mail.example.com/api");
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.api.page_size, 25);
        assert_eq!(config.workflow.completeness_scope, Scope::Full);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080/api");
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.api.page_size, 10);
        assert_eq!(config.workflow.completeness_scope, Scope::Trunk);
    }

    #[test]
    fn test_config_rejects_empty_base_url() {
        let err = Config::load_from_str("[api]\nbase_url = \"\"").unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_config_rejects_unknown_scope() {
        assert!(Config::load_from_str("[workflow]\ncompleteness_scope = \"some\"").is_err());
    }
}
