//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.rover/config.json`) and environment.
//! `Settings::resolve` turns it into the validated startup settings; anything
//! missing or malformed is reported there, before the webhook accepts requests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::device::{ConnectionStringError, HubConnectionString, IotHubOptions};

pub const DEVICE_ID_ENV: &str = "DEVICE_ID";
pub const CONNECTION_STRING_ENV: &str = "IOTHUB_CONNECTION_STRING";
pub const WEBHOOK_KEY_ENV: &str = "ROVER_WEBHOOK_KEY";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// The device commands are sent to.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Cloud device registry connection.
    #[serde(default)]
    pub hub: HubConfig,
}

/// Webhook bind, port, and auth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Port for HTTP (default 7071).
    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_webhook_bind")]
    pub bind: String,

    /// Auth settings. When absent, defaults to no auth for loopback bind.
    #[serde(default)]
    pub auth: WebhookAuthConfig,
}

/// Webhook auth: function key or none (loopback-only when none).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAuthConfig {
    #[serde(default)]
    pub mode: WebhookAuthMode,

    /// Key expected in `x-functions-key` or `?code=`. Overridden by ROVER_WEBHOOK_KEY env.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookAuthMode {
    /// No auth; allow only when bind is loopback.
    #[default]
    None,

    /// Require the configured key on every fulfillment request.
    Key,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Registry id of the rover. Overridden by DEVICE_ID env.
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubConfig {
    /// Service connection string (HostName=...;SharedAccessKeyName=...;SharedAccessKey=...).
    /// Overridden by IOTHUB_CONNECTION_STRING env.
    pub connection_string: Option<String>,
    /// Registry REST api-version (default 2021-04-12).
    pub api_version: Option<String>,
    /// Seconds the registry waits for the device to answer a direct method (default 30).
    pub method_timeout_secs: Option<u64>,
    /// Lifetime of each signed request token (default 3600).
    pub token_ttl_secs: Option<i64>,
}

fn default_webhook_port() -> u16 {
    7071
}

fn default_webhook_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: default_webhook_port(),
            bind: default_webhook_bind(),
            auth: WebhookAuthConfig::default(),
        }
    }
}

/// Startup misconfiguration. Never produced per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no device id configured (set DEVICE_ID or device.deviceId)")]
    MissingDeviceId,
    #[error("no registry connection string configured (set IOTHUB_CONNECTION_STRING or hub.connectionString)")]
    MissingConnectionString,
    #[error("invalid registry connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),
    #[error("webhook auth mode is \"key\" but no key is configured (set ROVER_WEBHOOK_KEY or webhook.auth.key)")]
    MissingWebhookKey,
    #[error("refusing to bind webhook to {0} without auth (set webhook.auth.mode to \"key\" and webhook.auth.key or ROVER_WEBHOOK_KEY)")]
    UnprotectedBind(String),
}

/// Validated settings the webhook runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub device_id: String,
    pub hub: HubConnectionString,
    pub hub_options: IotHubOptions,
    /// Required webhook key; `None` when auth mode is none.
    pub webhook_key: Option<String>,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        Self::resolve_with_env(config, |name| std::env::var(name).ok())
    }

    /// Resolve with `env` standing in for the process environment.
    pub fn resolve_with_env<F>(config: &Config, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_id = env_or_config(env(DEVICE_ID_ENV), config.device.device_id.as_ref())
            .ok_or(ConfigError::MissingDeviceId)?;
        let connection_string = env_or_config(
            env(CONNECTION_STRING_ENV),
            config.hub.connection_string.as_ref(),
        )
        .ok_or(ConfigError::MissingConnectionString)?;
        let hub = HubConnectionString::parse(&connection_string)?;

        let bind = config.webhook.bind.trim().to_string();
        let webhook_key = match config.webhook.auth.mode {
            WebhookAuthMode::Key => {
                let key = env_or_config(env(WEBHOOK_KEY_ENV), config.webhook.auth.key.as_ref());
                Some(key.ok_or(ConfigError::MissingWebhookKey)?)
            }
            WebhookAuthMode::None => None,
        };
        if webhook_key.is_none() && !is_loopback_bind(&bind) {
            return Err(ConfigError::UnprotectedBind(bind));
        }

        let defaults = IotHubOptions::default();
        let hub_options = IotHubOptions {
            api_version: config
                .hub
                .api_version
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.api_version),
            method_timeout_secs: config
                .hub
                .method_timeout_secs
                .unwrap_or(defaults.method_timeout_secs),
            token_ttl_secs: config.hub.token_ttl_secs.unwrap_or(defaults.token_ttl_secs),
        };

        Ok(Self {
            bind,
            port: config.webhook.port,
            device_id,
            hub,
            hub_options,
            webhook_key,
        })
    }
}

/// Env value if set and non-blank, otherwise the configured value if non-blank.
fn env_or_config(env: Option<String>, configured: Option<&String>) -> Option<String> {
    env.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
    .or_else(|| {
        configured
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ROVER_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".rover").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or ROVER_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
