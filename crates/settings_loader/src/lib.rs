//! # Settings Loader
//!
//! Centralized startup configuration for the ledgerboard server: an optional
//! `settings.json` file with environment-variable overrides, plus the
//! fail-fast master-key check.
//!
//! The master key is deliberately NOT part of the settings file: it arrives
//! only through the `LEDGERBOARD_MASTER_KEY` environment variable, and boot
//! aborts when it is missing. There is no generate-if-absent fallback and no
//! development default key.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Environment variable carrying the base64 AES-256 credential key.
pub const MASTER_KEY_ENV: &str = "LEDGERBOARD_MASTER_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ledgerboard.db")
}

/// Loads settings from a JSON file.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<AppSettings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: AppSettings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from an optional path, falling back to defaults when no
/// path is given. An explicitly named file that cannot be read is an error;
/// silence here would hide a typo'd `--settings` argument.
pub fn load_optional_settings(path: Option<&PathBuf>) -> Result<AppSettings> {
    match path {
        Some(settings_path) => load_settings(settings_path),
        None => Ok(AppSettings::default()),
    }
}

/// Applies `HOST` / `PORT` / `DATABASE_PATH` environment overrides on top of
/// whatever the file provided.
pub fn apply_env_overrides(settings: &mut AppSettings) {
    if let Ok(host) = env::var("HOST") {
        settings.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        if let Ok(port) = port.parse() {
            settings.port = port;
        }
    }
    if let Ok(path) = env::var("DATABASE_PATH") {
        settings.database_path = PathBuf::from(path);
    }
}

/// Reads the master key from the environment. Key material validation
/// (base64, 32 bytes) happens in the credential cipher; this only enforces
/// presence so a misconfigured deployment dies at boot, not on first use.
pub fn master_key_from_env() -> Result<String> {
    env::var(MASTER_KEY_ENV).map_err(|_| {
        anyhow!(
            "{} is not set; refusing to start without a credential key",
            MASTER_KEY_ENV
        )
    })
}
