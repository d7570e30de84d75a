// src/config/publisher.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

pub const ENV_PATH: &str = "PUBLISHER_CONFIG_PATH";
const ENV_PASSWORD: &str = "GHOST_PASSWORD";
const ENV_CLIENT_SECRET: &str = "GHOST_CLIENT_SECRET";

fn default_timeout_secs() -> u64 {
    20
}
fn default_connect_timeout_secs() -> u64 {
    5
}

/// Credentials and transport limits for the Ghost server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherSettings {
    pub server: String,
    pub client_id: String,
    /// "ENV" means: read from GHOST_CLIENT_SECRET
    pub client_secret: String,
    pub user: String,
    /// "ENV" means: read from GHOST_PASSWORD
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl PublisherSettings {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let shown = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| PipelineError::config(&shown, e.to_string()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_settings(&content, &ext).map_err(|msg| PipelineError::config(&shown, msg))?;
        cfg.resolve_env().map_err(|msg| PipelineError::config(&shown, msg))?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $PUBLISHER_CONFIG_PATH
    /// 2) config/publisher.toml
    /// 3) config/publisher.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(PipelineError::config(
                pb.display().to_string(),
                format!("{ENV_PATH} points to non-existent path"),
            ));
        }
        for candidate in ["config/publisher.toml", "config/publisher.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Err(PipelineError::config("config/publisher.*", "no publisher settings found"))
    }

    fn resolve_env(&mut self) -> std::result::Result<(), String> {
        if self.password.trim().eq_ignore_ascii_case("env") {
            self.password =
                std::env::var(ENV_PASSWORD).map_err(|_| format!("missing {ENV_PASSWORD} env var"))?;
        }
        if self.client_secret.trim().eq_ignore_ascii_case("env") {
            self.client_secret = std::env::var(ENV_CLIENT_SECRET)
                .map_err(|_| format!("missing {ENV_CLIENT_SECRET} env var"))?;
        }
        Ok(())
    }
}

fn parse_settings(s: &str, hint_ext: &str) -> std::result::Result<PublisherSettings, String> {
    // JSON documents always start with an object brace; everything else is tried as TOML.
    let looks_json = hint_ext == "json" || s.trim_start().starts_with('{');
    if looks_json {
        serde_json::from_str(s).map_err(|e| format!("invalid json: {e}"))
    } else {
        toml::from_str(s).map_err(|e| format!("invalid toml: {e}"))
    }
}
