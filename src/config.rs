use crate::prompt::PromptTemplate;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HTTPConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub http_client: HttpClientConfig,

    #[cfg(feature = "sentry")]
    pub sentry: Option<SentryConfig>,

    /// Secrets never come from the config file, only from the environment.
    #[serde(skip)]
    pub credentials: Credentials,
}
impl AppConfig {
    /// Load settings from the given TOML file, or `config.toml` if it exists,
    /// falling back to defaults. Credentials are always read from the environment.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(config_path) => Self::from_file(&config_path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    info!("No {DEFAULT_CONFIG_PATH} found, using default settings");
                    AppConfig::default()
                }
            }
        };

        config.credentials = Credentials::from_env();
        Ok(config)
    }

    fn from_file(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;

        Self::from_toml(&config_content)
            .with_context(|| format!("Failed to parse TOML config file: {config_path:?}"))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    /// Guards the `/sys` routes with `RELAY_HTTP_AUTH_TOKEN`. The webhook itself is never guarded.
    #[serde(default = "default_true")]
    pub require_authentication: bool,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            require_authentication: default_true(),
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI compatible API root, without the trailing `/chat/completions`.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default, deserialize_with = "deserialize_persona_template")]
    pub persona_template: PromptTemplate,
}
impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            temperature: None,
            max_tokens: None,
            persona_template: PromptTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayAuth {
    /// `Authorization: Bearer <api key>`, which is what the sandbox accepts for JWTs.
    #[default]
    Bearer,

    /// HTTP basic auth with the API key and secret.
    Basic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_messaging_url")]
    pub url: String,

    #[serde(default)]
    pub auth: GatewayAuth,
}
impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: default_messaging_url(),
            auth: GatewayAuth::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpClientConfig {
    /// Unset leaves reqwest's default (no total request timeout).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
impl HttpClientConfig {
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder
            .build()
            .with_context(|| "Failed to build outbound HTTP client")
    }
}

#[cfg(feature = "sentry")]
#[derive(Debug, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub debug: bool,

    /// Request bodies carry phone numbers and message text, so off unless asked for.
    #[serde(default)]
    pub send_default_pii: bool,
}

/// Messaging gateway account material.
#[derive(Clone, Default)]
pub struct GatewayCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub sender_number: String,
    pub sandbox_passphrase: String,
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub gateway: GatewayCredentials,

    /// Every reply is sent to this number.
    pub recipient_number: String,
    pub openai_api_key: String,
    pub http_auth_token: Option<String>,
}
impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Missing values are not fatal, they only produce failing downstream calls.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| match lookup(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                warn!("Missing {key} environment variable, calls depending on it will fail!");
                String::new()
            }
        };

        Self {
            gateway: GatewayCredentials {
                api_key: required("VONAGE_API_KEY"),
                api_secret: required("VONAGE_API_SECRET"),
                sender_number: required("VONAGE_WHATSAPP_NUMBER"),
                sandbox_passphrase: required("SANDBOX_PASSPHRASE"),
            },
            recipient_number: required("YOUR_PHONE_NUMBER"),
            openai_api_key: required("OPENAI_API_KEY"),
            http_auth_token: lookup("RELAY_HTTP_AUTH_TOKEN").filter(|token| !token.is_empty()),
        }
    }
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &str) -> &'static str {
            if value.is_empty() {
                "<unset>"
            } else {
                "<redacted>"
            }
        }

        f.debug_struct("Credentials")
            .field("gateway_api_key", &redact(&self.gateway.api_key))
            .field("gateway_api_secret", &redact(&self.gateway.api_secret))
            .field("sender_number", &self.gateway.sender_number)
            .field("sandbox_passphrase", &redact(&self.gateway.sandbox_passphrase))
            .field("recipient_number", &self.recipient_number)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("http_auth_token", &self.http_auth_token.as_deref().map(redact))
            .finish()
    }
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_completion_model() -> String {
    "gpt-4-turbo".to_string()
}
fn default_messaging_url() -> String {
    "https://messages-sandbox.nexmo.com/v0.1/messages".to_string()
}
fn default_true() -> bool {
    true
}
fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080)
}

fn deserialize_persona_template<'de, D>(deserializer: D) -> Result<PromptTemplate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let template = String::deserialize(deserializer)?;
    PromptTemplate::new(&template).map_err(serde::de::Error::custom)
}

fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    if !path.exists() {
        return Err(serde::de::Error::custom(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(serde::de::Error::custom(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    Ok(path)
}
