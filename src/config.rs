use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::websocket::codec::DEFAULT_MAX_PAYLOAD;
use crate::websocket::origin::{AllowedOrigin, OriginPolicy};

/// An allow-list entry as written in the config file: either a plain string
/// matched exactly, or `{ pattern: "<regex>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OriginRule {
    Literal(String),
    Pattern { pattern: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub health_path: String,
    pub handshake_timeout_ms: u64,
    pub max_message_size: usize,
    pub allowed_origins: Vec<OriginRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            health_path: "/ready".to_string(),
            handshake_timeout_ms: 2000,
            max_message_size: DEFAULT_MAX_PAYLOAD,
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// `WSGATE_CONFIG` names an optional YAML file; `LISTEN` overrides the
    /// listen address.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match lookup("WSGATE_CONFIG") {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        if let Some(listen_addr) = lookup("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Compiles the allow-list. Fails on an invalid pattern.
    pub fn origin_policy(&self) -> anyhow::Result<OriginPolicy> {
        let allowed = self
            .allowed_origins
            .iter()
            .map(|rule| match rule {
                OriginRule::Literal(origin) => Ok(AllowedOrigin::Literal(origin.clone())),
                OriginRule::Pattern { pattern } => AllowedOrigin::pattern(pattern)
                    .with_context(|| format!("Invalid origin pattern {pattern:?}")),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(OriginPolicy::new(allowed))
    }
}
