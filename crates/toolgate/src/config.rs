use std::env;
use std::fmt::{self, Debug};

use thiserror::Error;
use toolgate_arcade::{ArcadeConfig, ArcadeConfigBuilder};
use toolgate_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const DEFAULT_TOOLKITS: &str = "Gmail,Github";
const DEFAULT_USER_ID: &str = "default-user";

/// Errors while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// The `.env` file exists but cannot be loaded.
    #[error("failed to load .env: {0}")]
    Dotenv(String),
}

/// Settings of the assistant, read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    openai_api_key: String,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    arcade_api_key: String,
    arcade_base_url: Option<String>,
    /// Toolkits whose tools are offered to the model.
    pub toolkits: Vec<String>,
    /// Individual tools (qualified names) offered to the model.
    pub tools: Vec<String>,
    /// The user that remote tools act on behalf of.
    pub user_id: String,
}

impl Config {
    /// Reads the configuration from the process environment, after loading
    /// `.env` from the working directory (or a parent) if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(ConfigError::Dotenv(err.to_string())),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: var("OPENAI_BASE_URL"),
            openai_model: var("OPENAI_MODEL"),
            arcade_api_key: required("ARCADE_API_KEY")?,
            arcade_base_url: var("ARCADE_BASE_URL"),
            toolkits: split_list(
                &var("TOOLGATE_TOOLKITS").unwrap_or_else(|| DEFAULT_TOOLKITS.to_owned()),
            ),
            tools: split_list(&var("TOOLGATE_TOOLS").unwrap_or_default()),
            user_id: var("TOOLGATE_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_owned()),
        })
    }

    /// Returns the configuration of the model provider.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.openai_api_key);
        if let Some(base_url) = &self.openai_base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.openai_model {
            builder = builder.with_model(model);
        }
        builder.build()
    }

    /// Returns the configuration of the remote tool service.
    pub fn arcade_config(&self) -> ArcadeConfig {
        let mut builder = ArcadeConfigBuilder::with_api_key(&self.arcade_api_key)
            .with_toolkits(&self.toolkits)
            .with_tools(&self.tools);
        if let Some(base_url) = &self.arcade_base_url {
            builder = builder.with_base_url(base_url);
        }
        builder.build()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("arcade_api_key", &"<redacted>")
            .field("arcade_base_url", &self.arcade_base_url)
            .field("toolkits", &self.toolkits)
            .field("tools", &self.tools)
            .field("user_id", &self.user_id)
            .finish()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
