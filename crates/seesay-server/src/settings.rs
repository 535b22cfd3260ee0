//! Layered server settings: optional TOML file, then `SEESAY__*` environment

use config::{Config, ConfigError, Environment, File};
use seesay_core::{EngineConfig, ServerConfig};
use serde::Deserialize;

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "SEESAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "seesay.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path, Environment::with_prefix("SEESAY").separator("__"))
    }

    fn load_from(path: &str, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
