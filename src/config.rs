// src/config.rs

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::api::client::AuthScheme;
use crate::refresh::RefreshPolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://nyamix.up.railway.app/api/v1.0";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://res.cloudinary.com/dqlnpyxr4/";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_REFRESH_DELAY_SECS: u64 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_version: String,
    pub image_base_url: String,
    pub timeout: Duration,
    pub auth_scheme: AuthScheme,
    pub session_file: Option<PathBuf>,
    pub refresh: RefreshPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            auth_scheme: AuthScheme::Raw,
            session_file: None,
            refresh: RefreshPolicy::fixed(Duration::from_secs(DEFAULT_REFRESH_DELAY_SECS)),
        }
    }
}

impl AppConfig {
    /// Reads `NYAMIX_*` variables; anything unset keeps its default.
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(url) = env::var("NYAMIX_API_BASE_URL") {
            cfg.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Ok(version) = env::var("NYAMIX_API_VERSION") {
            cfg.api_version = version.trim().to_string();
        }
        if let Ok(url) = env::var("NYAMIX_IMAGE_BASE_URL") {
            cfg.image_base_url = url.trim().to_string();
        }
        if let Ok(path) = env::var("NYAMIX_SESSION_FILE") {
            if !path.trim().is_empty() {
                cfg.session_file = Some(PathBuf::from(path.trim()));
            }
        }

        cfg.timeout = Duration::from_millis(parse_var("NYAMIX_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?);
        cfg.auth_scheme = parse_var("NYAMIX_AUTH_SCHEME", AuthScheme::Raw)?;

        let delay = parse_var("NYAMIX_REFRESH_DELAY_SECS", DEFAULT_REFRESH_DELAY_SECS)?;
        let attempts = parse_var("NYAMIX_REFRESH_ATTEMPTS", 1u32)?;
        cfg.refresh = if attempts <= 1 {
            RefreshPolicy::fixed(Duration::from_secs(delay))
        } else {
            RefreshPolicy::backoff(Duration::from_secs(delay), attempts)
        };

        Ok(cfg)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}
