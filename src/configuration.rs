use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::subscription_client::SubscriptionClient;

/// Global configuration, loaded from `configuration/*.yaml`. See
/// `get_configuration`.
#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub subscription: SubscriptionSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    /// Shown as `name` in every bunyan log line
    pub name: String,

    /// Default filter for the tracing subscriber; `RUST_LOG` takes precedence
    pub log_level: String,
}

/// Where (and how patiently) to send subscription requests
#[derive(Deserialize, Clone, Debug)]
pub struct SubscriptionSettings {
    /// e.g. `https://api.horedev4sec.biz.id`; tests point this at a
    /// `wiremock::MockServer`
    pub base_url: String,

    /// Path joined onto `base_url`, normally `/api/subscribe`
    pub endpoint: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,

    /// How long an outcome notification stays visible before it is dismissed
    /// automatically
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub notification_milliseconds: u64,
}

impl SubscriptionSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_milliseconds)
    }

    pub fn client(&self) -> Result<SubscriptionClient, anyhow::Error> {
        SubscriptionClient::new(&self.base_url, &self.endpoint, self.timeout())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`.
///
/// `base.yaml` is read first, then the file for the current environment
/// (`APP_ENVIRONMENT`, `local` if unset), then `APP_`-prefixed env vars:
///
/// `APP_SUBSCRIPTION__BASE_URL=http://localhost:3000` ->
/// `Settings.subscription.base_url`
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        // env vars are always strings, hence `deserialize_number_from_string`
        // on the numeric fields
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
