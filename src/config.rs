//! Process configuration, resolved once at startup and read-only afterwards.

use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::normalize::TimestampPolicy;
use crate::sources::oura::DEFAULT_BASE_URL;
use crate::sources::SourceError;

/// Key of the wearable API token, both in the secrets file and the environment.
pub const TOKEN_KEY: &str = "OURA_API_TOKEN";

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;

/// Bearer token for the remote source. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token, rejecting blank values.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Credential(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Stable hash of the token, used as a cache key component.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Errors raised while reading configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be used
    InvalidValue { key: String, value: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid value '{}' for {}: {}", value, key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Dashboard configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server host address (default: "127.0.0.1")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Selectable user identities, display only
    pub users: Vec<String>,
    /// Indoor sensor sample file
    pub environment_csv: PathBuf,
    /// Outdoor weather extremes file, if any
    pub weather_csv: Option<PathBuf>,
    pub secrets_path: PathBuf,
    /// Base URL of the wearable collections API
    pub api_base: String,
    /// Per-request timeout for remote calls
    pub request_timeout_secs: u64,
    pub timestamp_policy: TimestampPolicy,
    /// Resolved API token, or the reason it is unavailable
    pub credential: Result<Credential, SourceError>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 3000,
            users: vec!["YW".to_string(), "User2".to_string()],
            environment_csv: PathBuf::from("yw_govee.csv"),
            weather_csv: None,
            secrets_path: PathBuf::from("secrets.json"),
            api_base: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 20,
            timestamp_policy: TimestampPolicy::WallClock,
            credential: Err(missing_credential()),
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset
    /// keys. The credential is resolved last, from the secrets file and
    /// then `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| invalid("PORT", &value, e))?,
            None => defaults.port,
        };

        let request_timeout_secs = match get("VITALS_REQUEST_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|e| invalid("VITALS_REQUEST_TIMEOUT_SECS", &value, e))?
                .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
            None => defaults.request_timeout_secs,
        };

        let timestamp_policy = match get("VITALS_TIMESTAMP_POLICY") {
            Some(value) => value
                .parse::<TimestampPolicy>()
                .map_err(|e| invalid("VITALS_TIMESTAMP_POLICY", &value, e))?,
            None => defaults.timestamp_policy,
        };

        let users = get("VITALS_USERS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|users| !users.is_empty())
            .unwrap_or(defaults.users);

        let secrets_path = get("VITALS_SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.secrets_path);
        let credential = resolve_credential(&secrets_path, &lookup);

        Ok(Settings {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            users,
            environment_csv: get("VITALS_ENVIRONMENT_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.environment_csv),
            weather_csv: get("VITALS_WEATHER_CSV").map(PathBuf::from),
            secrets_path,
            api_base: get("VITALS_API_BASE").unwrap_or(defaults.api_base),
            request_timeout_secs,
            timestamp_policy,
            credential,
        })
    }
}

/// Resolves the API token: secrets file first, then `lookup`.
///
/// An unreadable or malformed secrets file is logged and skipped. Returns
/// `SourceError::ConfigurationMissing` when neither layer has a token.
pub fn resolve_credential<F>(secrets_path: &Path, lookup: F) -> Result<Credential, SourceError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(credential) = read_secrets_file(secrets_path) {
        info!(path = %secrets_path.display(), "using API token from secrets file");
        return Ok(credential);
    }

    if let Some(credential) = lookup(TOKEN_KEY).and_then(Credential::new) {
        info!("using API token from environment");
        return Ok(credential);
    }

    Err(missing_credential())
}

fn read_secrets_file(path: &Path) -> Option<Credential> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read secrets file");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(secrets) => secrets
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .and_then(Credential::new),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed secrets file");
            None
        }
    }
}

fn missing_credential() -> SourceError {
    SourceError::ConfigurationMissing(format!(
        "{} not found in secrets file or environment",
        TOKEN_KEY
    ))
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
