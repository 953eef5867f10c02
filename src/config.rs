//! Application configuration, resolved once at startup.
//!
//! Everything user-tunable arrives through the process environment. The
//! provider credential may instead live in an adjacent `api_key` file so the
//! secret never has to be exported; either way its absence fails startup
//! with a one-line error instead of a stack trace from the HTTP client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::inference::Provider;
use crate::pipeline::FailurePolicy;

pub const APP_NAME: &str = "Scanlens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Credential file looked up next to the working directory when the
/// provider's environment variable is unset.
pub const API_KEY_FILE: &str = "api_key";

const DEFAULT_SCAN_DIR: &str = "./ct";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown provider {0:?} (expected \"openai\" or \"gemini\")")]
    InvalidProvider(String),

    #[error("Unknown failure policy {0:?} (expected \"strict\" or \"best-effort\")")]
    InvalidFailurePolicy(String),

    #[error("Invalid bind address {0:?}")]
    InvalidBindAddr(String),

    #[error("Invalid request timeout {0:?} (expected whole seconds)")]
    InvalidTimeout(String),

    #[error("Missing API credential: set {var} or place the key in ./{file}")]
    MissingApiKey { var: &'static str, file: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the DICOM slice series. Read-only, shared by the
    /// volume loader (startup) and the report pipeline (per request).
    pub scan_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub provider: Provider,
    pub failure_policy: FailurePolicy,
    pub request_timeout_secs: u64,
    pub api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars, Path::new("."))
    }

    /// Build a config from an explicit variable map. `secrets_dir` is where
    /// the credential-file fallback is looked up. Split out from
    /// [`AppConfig::from_env`] so tests never mutate process state.
    pub fn from_vars(
        vars: &HashMap<String, String>,
        secrets_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let scan_dir = PathBuf::from(
            vars.get("SCANLENS_SCAN_DIR")
                .map(String::as_str)
                .unwrap_or(DEFAULT_SCAN_DIR),
        );

        let bind = vars
            .get("SCANLENS_BIND")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind.to_string()))?;

        let provider = match vars.get("SCANLENS_PROVIDER") {
            None => Provider::OpenAi,
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidProvider(raw.clone()))?,
        };

        let failure_policy = match vars.get("SCANLENS_FAILURE_POLICY") {
            None => FailurePolicy::Strict,
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidFailurePolicy(raw.clone()))?,
        };

        let request_timeout_secs = match vars.get("SCANLENS_REQUEST_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?,
        };

        let api_key = load_api_key(provider, vars, secrets_dir)?;

        Ok(Self {
            scan_dir,
            bind_addr,
            provider,
            failure_policy,
            request_timeout_secs,
            api_key,
        })
    }
}

/// Resolve the provider credential: environment variable first, then the
/// adjacent secrets file.
fn load_api_key(
    provider: Provider,
    vars: &HashMap<String, String>,
    secrets_dir: &Path,
) -> Result<String, ConfigError> {
    let var = provider.api_key_var();

    if let Some(key) = vars.get(var) {
        let key = key.trim();
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    let file = secrets_dir.join(API_KEY_FILE);
    if let Ok(contents) = std::fs::read_to_string(&file) {
        let key = contents.trim();
        if !key.is_empty() {
            tracing::debug!(path = %file.display(), "API credential loaded from file");
            return Ok(key.to_string());
        }
    }

    Err(ConfigError::MissingApiKey {
        var,
        file: API_KEY_FILE,
    })
}
