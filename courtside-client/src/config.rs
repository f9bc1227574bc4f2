use std::{env, fmt::Display, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConnectionError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const DEFAULT_ASSET_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for every endpoint, e.g. `http://host/api`.
    pub base_url: String,
    /// Host that `/uploads/...` avatar paths are served from.
    pub asset_base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            asset_base_url: DEFAULT_ASSET_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Default::default() }
    }

    pub fn from_env() -> Self {
        Self {
            base_url: try_load("COURTSIDE_API_URL", DEFAULT_API_URL.to_string()),
            asset_base_url: try_load("COURTSIDE_ASSET_URL", DEFAULT_ASSET_URL.to_string()),
            timeout_secs: try_load("COURTSIDE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        self.base_url.trim_end_matches('/').to_string() + path
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConnectionError::Config(format!("base url '{}' is not http(s)", self.base_url)));
        }
        Ok(reqwest::Client::builder().timeout(self.timeout()).build()?)
    }
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(key) {
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = ClientConfig::new("http://api.local/v1/");
        assert_eq!(config.endpoint("/users/networking"), "http://api.local/v1/users/networking");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"base_url":"http://x"}"#).unwrap();
        assert_eq!(config.base_url, "http://x");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.asset_base_url, DEFAULT_ASSET_URL);
    }

    #[test]
    fn non_http_base_is_rejected() {
        let err = ClientConfig::new("ftp://x").http_client().unwrap_err();
        assert!(matches!(err, ConnectionError::Config(_)));
    }

    #[test]
    fn load_reads_json_file() {
        let path = std::env::temp_dir().join(format!("courtside-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"base_url":"https://api.example.org","timeout_secs":3}"#).unwrap();
        let config = ClientConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.base_url, "https://api.example.org");
    }
}
