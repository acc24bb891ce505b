// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration module

use crate::http::{BasicAuth, ClientOptions, HmacConfig, TlsIdentity};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "radiobridge.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the content API, e.g. `https://host/api/v2`
    #[serde(default)]
    pub url: String,

    /// Sent as the `api-key` header on every backend call
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: u32,

    pub auth: Option<BasicAuth>,

    pub tls: Option<TlsFiles>,

    pub hmac: Option<HmacConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            timeout_ms: default_timeout(),
            retry: 0,
            auth: None,
            tls: None,
            hmac: None,
        }
    }
}

/// Client certificate and key, PEM files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_timeout() -> u64 {
    10000
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Load configuration from `path` (or `radiobridge.toml` when present)
    /// and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => Config::default(),
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse TOML, resolving `${VAR}` references in every string value
    pub fn parse(content: &str) -> Result<Self> {
        let mut value: toml::Value = toml::from_str(content)?;
        resolve_in_place(&mut value);
        Ok(value.try_into()?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RADIOBRIDGE_URL") {
            self.backend.url = url;
        }
        if let Some(api_key) = lookup("RADIOBRIDGE_API_KEY") {
            self.backend.api_key = Some(api_key);
        }
        if let Some(port) = lookup("PORT") {
            self.server.bind = format!("0.0.0.0:{}", port);
        }
    }

    /// Options for the bound backend client
    pub fn client_options(&self) -> Result<ClientOptions> {
        if self.backend.url.is_empty() {
            anyhow::bail!("No backend URL configured. Set [backend].url or RADIOBRIDGE_URL");
        }

        let mut headers = HashMap::new();
        if let Some(api_key) = &self.backend.api_key {
            headers.insert("api-key".to_string(), api_key.clone());
        }

        let tls = match &self.backend.tls {
            Some(files) => Some(TlsIdentity {
                cert: fs::read_to_string(&files.cert)
                    .with_context(|| format!("Failed to read certificate: {}", files.cert.display()))?,
                key: fs::read_to_string(&files.key)
                    .with_context(|| format!("Failed to read private key: {}", files.key.display()))?,
            }),
            None => None,
        };

        Ok(ClientOptions {
            base_url: self.backend.url.trim_end_matches('/').to_string(),
            headers,
            query: HashMap::new(),
            auth: self.backend.auth.clone(),
            tls,
            hmac: self.backend.hmac.clone(),
            timeout: Some(Duration::from_millis(self.backend.timeout_ms)),
            retry: (self.backend.retry > 0).then_some(self.backend.retry),
        })
    }
}

fn resolve_in_place(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = resolve_env_vars(s),
        toml::Value::Array(items) => items.iter_mut().for_each(resolve_in_place),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| resolve_in_place(v)),
        _ => {}
    }
}

/// Resolve ${VAR} references to environment variables
fn resolve_env_vars(value: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

    let mut result = value.to_string();

    for cap in re.captures_iter(value) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(env_value) = std::env::var(var_name) {
            result = result.replace(full_match, &env_value);
        }
    }

    result
}
