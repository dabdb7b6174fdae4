// src/config.rs
//! Service configuration.
//!
//! Lookup order:
//! 1) `$RESCUE_CONFIG_PATH` (must exist when set)
//! 2) `config/rescue.toml`
//! 3) built-in defaults, including the built-in source table
//!
//! `RESCUE_RESULT_CAP` and `RESCUE_FETCH_TIMEOUT_SECS` override the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::sources::{builtin_sources, SourceDescriptor};

pub const ENV_CONFIG_PATH: &str = "RESCUE_CONFIG_PATH";
pub const ENV_RESULT_CAP: &str = "RESCUE_RESULT_CAP";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "RESCUE_FETCH_TIMEOUT_SECS";
pub const DEFAULT_CONFIG_PATH: &str = "config/rescue.toml";

fn default_result_cap() -> usize {
    10
}
fn default_fetch_timeout_secs() -> u64 {
    8
}
fn default_user_agent() -> String {
    concat!("rescue-updates/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Maximum updates per response.
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
    /// Upper bound for any single source fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "builtin_sources")]
    pub sources: Vec<SourceDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            result_cap: default_result_cap(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            static_dir: default_static_dir(),
            sources: builtin_sources(),
        }
    }
}

impl AppConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing rescue config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading rescue config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Resolve the config file (env → default path → built-ins), then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            info!(path = %pb.display(), "loading rescue config");
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            info!(path = DEFAULT_CONFIG_PATH, "loading rescue config");
            Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            info!("no rescue config file, using built-in sources");
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(cap) = parse_positive_env(ENV_RESULT_CAP) {
            self.result_cap = cap as usize;
        }
        if let Some(secs) = parse_positive_env(ENV_FETCH_TIMEOUT_SECS) {
            self.fetch_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.result_cap == 0 {
            bail!("result_cap must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }
        if self.sources.is_empty() {
            bail!("at least one source must be configured");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.name().trim().is_empty() {
                bail!("source names must not be empty");
            }
            if !seen.insert(s.name()) {
                bail!("duplicate source name '{}'", s.name());
            }
            if let SourceDescriptor::Html(h) = s {
                if !matches!(h.url.scheme(), "http" | "https") {
                    bail!("source '{}' url must use http or https, got '{}'", h.name, h.url);
                }
            }
        }
        Ok(())
    }
}

fn parse_positive_env(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(key, value = %raw, "ignoring invalid env override");
            None
        }
    }
}
