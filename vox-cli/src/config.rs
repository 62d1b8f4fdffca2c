//! CLI configuration: `~/.config/vox/config.toml` plus env overrides.
//!
//! Env always wins: `VOX_API_URL` and `VOX_API_KEY` override the file. A
//! malformed config file degrades to defaults with a warning rather than
//! failing the run — the API key check happens when the client is built.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use vox_api::ApiClient;

pub const DEFAULT_API_URL: &str = "https://api.retellai.com";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CliConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl CliConfig {
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vox")
            .join("config.toml")
    }

    /// Build the API client, env overrides applied.
    pub fn client(&self) -> Result<ApiClient> {
        let url = std::env::var("VOX_API_URL")
            .ok()
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let Some(key) = std::env::var("VOX_API_KEY").ok().or_else(|| self.api_key.clone())
        else {
            bail!(
                "no API key configured; set VOX_API_KEY or add api_key to {}",
                Self::config_path().display()
            );
        };
        Ok(ApiClient::new(url, key))
    }
}
