use crate::config::{
    DEFAULT_MAX_IN_FLIGHT, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, MAX_PAGE_SIZE,
};
use crate::core::ConfigProvider;
use crate::utils::error::{InventoryError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub page_size: Option<usize>,
    pub max_in_flight: Option<usize>,
    /// 0 disables the per-page deadline.
    pub page_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(InventoryError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| InventoryError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the value of the environment variable. Unset
    /// variables are left in place and rejected by validation where it matters.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| InventoryError::ConfigError {
            message: format!("placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("server.url", &self.server.url)?;

        if let Some(token) = &self.server.token {
            validation::validate_non_empty_string("server.token", token)?;
            if token.contains("${") {
                return Err(InventoryError::InvalidConfigValueError {
                    field: "server.token".to_string(),
                    value: token.clone(),
                    reason: "environment variable is not set".to_string(),
                });
            }
        }

        validation::validate_range("fetch.page_size", self.page_size(), 1, MAX_PAGE_SIZE)?;
        validation::validate_positive_number("fetch.max_in_flight", self.max_in_flight(), 1)?;
        validation::validate_positive_number(
            "fetch.request_timeout_seconds",
            self.request_timeout().as_secs() as usize,
            1,
        )?;

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn base_url(&self) -> &str {
        &self.server.url
    }

    fn token(&self) -> Option<&str> {
        self.server.token.as_deref()
    }

    fn page_size(&self) -> usize {
        self.fetch.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn max_in_flight(&self) -> usize {
        self.fetch.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT)
    }

    fn page_timeout(&self) -> Option<Duration> {
        match self
            .fetch
            .page_timeout_seconds
            .unwrap_or(DEFAULT_PAGE_TIMEOUT_SECS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.fetch
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
