//! Client configuration management.
//!
//! This module holds the settings a [`Client`](crate::Client) is built
//! from: API host, response format, session cache location and default
//! transport options.
//!
//! The session cache defaults to `~/.cache/simaland-sdk/`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::DispatchOptions;
use crate::error::{Error, Result};

/// Application name used for the cache directory path
const APP_NAME: &str = "simaland-sdk";

/// Public API host
pub const DEFAULT_BASE_URL: &str = "https://www.sima-land.ru/";

/// Path prefix shared by every endpoint
pub const DEFAULT_API_PATH: &str = "/api/v5/";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Format of the response bodies requested through the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Xml => "xml",
        }
    }

    pub fn accept_header(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Xml => "application/xml",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ResponseFormat::Json),
            "xml" => Ok(ResponseFormat::Xml),
            other => Err(Error::Validation(format!("Unknown format \"{}\"", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_path: String,
    pub format: ResponseFormat,
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub options: DispatchOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            format: ResponseFormat::default(),
            cache_dir: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            options: DispatchOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Build a config from `SIMALAND_*` environment variables, loading a
    /// `.env` file first if one is present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("SIMALAND_BASE_URL") {
            config.base_url = url;
        }
        if let Some(format) = lookup("SIMALAND_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(dir) = lookup("SIMALAND_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("SIMALAND_TIMEOUT_SECS") {
            config.timeout_secs = secs.parse().map_err(|_| {
                Error::Validation(format!("SIMALAND_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Validation(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Validation("Timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Full URL prefix that endpoint paths are appended to
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.api_path.trim_matches('/')
        )
    }

    /// Directory holding the session token file
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Validation("Could not find cache directory".to_string()))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
