//! Client configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Backend
    pub api_base_url: Url,
    pub ws_url: Url,

    // Session
    pub token_path: PathBuf,
    /// Prepended to the stored token in the Authorization header
    pub bearer_prefix: String,

    // HTTP
    pub http_timeout: Option<Duration>,

    // Live channel
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// 0 means reconnect forever
    pub reconnect_max_attempts: u32,
    pub resync_on_reconnect: bool,

    // Logging
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = parse_url(
            "API_BASE_URL",
            &env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string()),
        )?;

        let ws_url = match env::var("WS_URL") {
            Ok(raw) => parse_url("WS_URL", &raw)?,
            Err(_) => derive_ws_url(&api_base_url)?,
        };
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme("WS_URL", ws_url.scheme().to_string()));
        }

        Ok(Self {
            api_base_url,
            ws_url,

            token_path: env::var("TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".supportchat/storage.json")),
            bearer_prefix: env::var("BEARER_PREFIX").unwrap_or_default(),

            http_timeout: match env::var("HTTP_TIMEOUT_MS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0)
            {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },

            reconnect_base_delay: Duration::from_millis(
                env::var("RECONNECT_BASE_DELAY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .unwrap_or(500),
            ),
            reconnect_max_delay: Duration::from_millis(
                env::var("RECONNECT_MAX_DELAY_MS")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .unwrap_or(30000),
            ),
            reconnect_max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            resync_on_reconnect: env::var("RESYNC_ON_RECONNECT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    /// Configuration pointing at one backend, everything else at defaults
    pub fn for_base_url(api_base_url: Url) -> Result<Self, ConfigError> {
        let ws_url = derive_ws_url(&api_base_url)?;
        Ok(Self {
            api_base_url,
            ws_url,
            token_path: PathBuf::from(".supportchat/storage.json"),
            bearer_prefix: String::new(),
            http_timeout: None,
            reconnect_base_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_max_attempts: 0,
            resync_on_reconnect: false,
            log_format: LogFormat::Pretty,
        })
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var, e.to_string()))
}

/// `http://host:port/` becomes `ws://host:port/ws`
fn derive_ws_url(api_base_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_base_url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(ConfigError::UnsupportedScheme("API_BASE_URL", other.to_string())),
    };

    let mut ws_url = api_base_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| ConfigError::UnsupportedScheme("API_BASE_URL", scheme.to_string()))?;
    ws_url.set_path("/ws");
    Ok(ws_url)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("Unsupported URL scheme in {0}: {1}")]
    UnsupportedScheme(&'static str, String),
}
