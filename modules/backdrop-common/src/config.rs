use std::env;
use std::time::Duration;

use crate::error::{BackdropError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Instruction a new session starts with.
pub const DEFAULT_INSTRUCTION: &str = "Change the background of this image to be a modern, \
bright IT company office with glass walls and tech vibes. The person is a software engineer. \
Keep the person intact and realistic, just replace the outdoor background.";

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    // Gemini
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub gemini_timeout: Duration,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Sessions
    pub max_upload_bytes: usize,
    pub default_instruction: String,
    /// Idle time after which an HTTP session is dropped.
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &preview(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("gemini_timeout", &self.gemini_timeout)
            .field("web_host", &self.web_host)
            .field("web_port", &self.web_port)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("session_ttl", &self.session_ttl)
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    /// A missing API key is fatal.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .ok_or_else(|| {
                BackdropError::Config("GEMINI_API_KEY environment variable is required".to_string())
            })?;

        Ok(Self {
            gemini_api_key: gemini_api_key.trim().to_string(),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: var("GEMINI_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            gemini_timeout: Duration::from_secs(parse_var(&var, "GEMINI_TIMEOUT_SECS", 120)?),
            web_host: var("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: parse_var(&var, "WEB_PORT", 3000)?,
            max_upload_bytes: parse_var(
                &var,
                "BACKDROP_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            default_instruction: var("BACKDROP_DEFAULT_INSTRUCTION")
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            session_ttl: Duration::from_secs(parse_var(
                &var,
                "BACKDROP_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL.as_secs(),
            )?),
            max_sessions: parse_var(&var, "BACKDROP_MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?,
        })
    }

    /// Log the loaded configuration with secrets reduced to a short preview.
    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  GEMINI_API_KEY: {}", preview(&self.gemini_api_key));
        tracing::info!("  GEMINI_MODEL: {}", self.gemini_model);
        tracing::info!("  GEMINI_API_BASE: {}", self.gemini_api_base);
        tracing::info!("  GEMINI_TIMEOUT_SECS: {}", self.gemini_timeout.as_secs());
        tracing::info!("  WEB: {}:{}", self.web_host, self.web_port);
        tracing::info!("  BACKDROP_MAX_UPLOAD_BYTES: {}", self.max_upload_bytes);
        tracing::info!("  BACKDROP_SESSION_TTL_SECS: {}", self.session_ttl.as_secs());
        tracing::info!("  BACKDROP_MAX_SESSIONS: {}", self.max_sessions);
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BackdropError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

fn preview(val: &str) -> String {
    let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.chars().count())
}
