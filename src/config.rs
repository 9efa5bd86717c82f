//! Process configuration, read once at start-up.

use std::{fmt::Display, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_PORT: &str = "5000";
pub const DEFAULT_CLUSTER: &str = "cluster0.h5nkbla.mongodb.net";
pub const DEFAULT_DATABASE: &str = "tastyDB";
/// Used when `RUST_LOG` is unset. The subscriber is installed before
/// [`Config`] loads so that loading can log.
pub const DEFAULT_LOG_FILTER: &str = "tasty_drop=debug,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);

        let mongo_uri = match vars.get("MONGODB_URI") {
            Some(uri) => uri,
            None => {
                warn!("MONGODB_URI not set, building Atlas URI from DB_USER and DB_PASS");
                format!(
                    "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
                    vars.require("DB_USER")?,
                    vars.require("DB_PASS")?,
                    vars.or("DB_CLUSTER", DEFAULT_CLUSTER),
                )
            }
        };

        Ok(Self {
            port: vars.parse("PORT", DEFAULT_PORT)?,
            mongo_uri,
            database_name: vars.or("DB_NAME", DEFAULT_DATABASE),
            jwt_secret: vars.require("JWT_SECRET")?,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.or(key, default).parse().map_err(|err: T::Err| {
            warn!("Invalid {key} value: {err}");
            ConfigError::Invalid {
                key,
                reason: err.to_string(),
            }
        })
    }
}
