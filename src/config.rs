//! Configuration for the Graph API and the sending account
//!
//! Loads configuration from config.yml, with `${VAR}` placeholders and
//! explicit environment variables taking precedence.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const GRAPH_API_URL: &str = "https://graph.microsoft.com/v1.0";
pub const LOGIN_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_MESSAGE: &str = "Hello from Microsoft Teams!";

/// Scopes requested for every run: chat read/write and reading all user profiles.
pub const GRAPH_SCOPES: &[&str] = &["Chat.ReadWrite", "User.Read.All"];

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    graph: Option<GraphConfig>,
    auth: Option<AuthConfig>,
    sender: Option<SenderConfig>,
    message: Option<MessageConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphConfig {
    api_url: Option<String>,
    login_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthConfig {
    tenant_id: Option<String>,
    client_id: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SenderConfig {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageConfig {
    default: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub tenant_id: String,
    pub client_id: String,
    pub access_token: Option<String>,
    /// Object id of the signed-in account; one side of every one-on-one chat.
    pub sender_id: String,
    pub graph_url: String,
    pub login_url: String,
    pub default_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or fall back to the environment alone.
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
                // Unresolved placeholder must not leak into requests.
                return std::env::var(env_key).unwrap_or_default();
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value.unwrap_or_default()
    }

    fn non_empty(value: String) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self::load_dotenv();

        let graph = yaml.graph.unwrap_or_default();
        let auth = yaml.auth.unwrap_or_default();
        let sender = yaml.sender.unwrap_or_default();
        let message = yaml.message.unwrap_or_default();

        let graph_url = Self::non_empty(Self::resolve_env_string(graph.api_url, "GRAPH_API_URL"))
            .unwrap_or_else(|| GRAPH_API_URL.to_string());
        let login_url =
            Self::non_empty(Self::resolve_env_string(graph.login_url, "GRAPH_LOGIN_URL"))
                .unwrap_or_else(|| LOGIN_URL.to_string());

        Self {
            tenant_id: Self::resolve_env_string(auth.tenant_id, "TEAMS_TENANT_ID"),
            client_id: Self::resolve_env_string(auth.client_id, "TEAMS_CLIENT_ID"),
            access_token: Self::non_empty(Self::resolve_env_string(
                auth.access_token,
                "GRAPH_ACCESS_TOKEN",
            )),
            sender_id: Self::resolve_env_string(sender.id, "TEAMS_SENDER_ID")
                .trim()
                .to_string(),
            graph_url: graph_url.trim_end_matches('/').to_string(),
            login_url: login_url.trim_end_matches('/').to_string(),
            default_message: message
                .default
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
        }
    }

    /// The caller's own identity, required before any chat can be created.
    pub fn require_sender_id(&self) -> Result<&str> {
        if self.sender_id.is_empty() {
            return Err(Error::ConfigError(
                "Sender id is not set (TEAMS_SENDER_ID or sender.id in config.yml)".to_string(),
            ));
        }
        Ok(&self.sender_id)
    }
}
