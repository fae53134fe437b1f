//! Application configuration resolved from the environment.
//!
//! Values are read through an injectable lookup so tests never touch the
//! process environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "EpaFeedback";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Cannot determine home directory; set {0}")]
    NoHomeDir(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "warn,epa_feedback_lib=info,epa_feedback=info"
}

/// Get the application data directory: ~/EpaFeedback/
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// External analysis settings. Present only when an API key is set.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub base_url: String,
    pub catalog_path: Option<PathBuf>,
    pub llm: Option<LlmSettings>,
    pub mail_from: Option<String>,
    pub outbox_dir: PathBuf,
}

impl AppConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from any name → value lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_path = match get("EPA_DATABASE_PATH") {
            Some(p) => PathBuf::from(p),
            None => app_data_dir()
                .ok_or(ConfigError::NoHomeDir("EPA_DATABASE_PATH"))?
                .join("sessions.db"),
        };

        let outbox_dir = match get("EPA_OUTBOX_DIR") {
            Some(p) => PathBuf::from(p),
            None => app_data_dir()
                .ok_or(ConfigError::NoHomeDir("EPA_OUTBOX_DIR"))?
                .join("outbox"),
        };

        let bind_raw = get("EPA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: "EPA_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let llm = match get("OPENAI_API_KEY") {
            None => None,
            Some(api_key) => {
                let timeout_secs = match get("EPA_LLM_TIMEOUT_SECS") {
                    None => DEFAULT_LLM_TIMEOUT_SECS,
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(secs) if secs > 0 => secs,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                name: "EPA_LLM_TIMEOUT_SECS",
                                value: raw,
                            })
                        }
                    },
                };
                Some(LlmSettings {
                    api_key,
                    model: get("OPENAI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.into()),
                    base_url: get("OPENAI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
                    timeout_secs,
                })
            }
        };

        Ok(Self {
            database_path,
            bind_addr,
            base_url: get("APP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            catalog_path: get("EPA_CATALOG_PATH").map(PathBuf::from),
            llm,
            mail_from: get("MAIL_FROM"),
            outbox_dir,
        })
    }
}
