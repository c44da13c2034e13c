//! Shared configuration for Cirro consumers.
//!
//! TOML profiles, credential resolution (keyring + env + plaintext),
//! and translation to a ready-to-use `cirro_api::ApiClient`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cirro_api::{ApiClient, TlsMode, TransportConfig};

/// The public API endpoint used when a profile does not override it.
pub const DEFAULT_API_URL: &str = "https://api.cirrostack.dev/v4";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to build API client: {0}")]
    Client(#[from] cirro_api::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named API profiles (accounts, regions, staging endpoints).
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to the configured default.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::UnknownProfile("<none>".into()))?;
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_owned()))?;
        Ok((name, profile))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// A named API profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API base URL; the public endpoint when unset.
    pub api_url: Option<String>,

    /// Personal access token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate (staging endpoints behind a
    /// corporate proxy).
    pub ca_cert: Option<PathBuf>,

    /// Override timeout in seconds.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "cirrostack", "cirro").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cirro");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment (`CIRRO_`-prefixed).
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path; split out so tests avoid the real home
/// directory.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CIRRO_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an access token from the credential chain:
/// profile env var, then system keyring, then plaintext config.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new("cirro", &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store an access token in the system keyring for a profile.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new("cirro", &format!("{profile_name}/token")).map_err(|e| {
        ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        }
    })?;
    entry
        .set_password(token)
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Client construction ─────────────────────────────────────────────

/// Build transport settings from a profile plus global defaults.
pub fn profile_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let tls = profile
        .ca_cert
        .as_ref()
        .map_or(TlsMode::System, |path| TlsMode::CustomCa(path.clone()));

    TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    }
}

/// Build a ready-to-use `ApiClient` from a profile.
pub fn profile_to_client(
    config: &Config,
    profile_name: Option<&str>,
) -> Result<ApiClient, ConfigError> {
    let (name, profile) = config.profile(profile_name)?;

    let api_url = profile.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
    let _: url::Url = api_url.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {api_url}"),
    })?;

    let token = resolve_token(profile, name)?;
    let transport = profile_transport(profile, &config.defaults);

    Ok(ApiClient::from_token(api_url, &token, &transport)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 30);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn load_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "staging".into(),
            Profile {
                api_url: Some("https://staging.cirrostack.dev/v4".into()),
                token: Some("t0ken".into()),
                timeout: Some(5),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (name, profile) = loaded.profile(Some("staging")).unwrap();
        assert_eq!(name, "staging");
        assert_eq!(profile.timeout, Some(5));
    }

    #[test]
    fn plaintext_token_resolves_last() {
        let profile = Profile {
            token: Some("plain".into()),
            ..Profile::default()
        };
        let token = resolve_token(&profile, "test-no-keyring-entry").unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn missing_credentials_error_names_profile() {
        let profile = Profile::default();
        let err = resolve_token(&profile, "empty").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn unknown_profile_rejected() {
        let config = Config::default();
        assert!(matches!(
            config.profile(Some("nope")),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn profile_timeout_overrides_default() {
        let defaults = Defaults::default();
        let profile = Profile {
            timeout: Some(5),
            ..Profile::default()
        };
        let transport = profile_transport(&profile, &defaults);
        assert_eq!(transport.timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_api_url_rejected() {
        let mut config = Config::default();
        config.profiles.insert(
            "bad".into(),
            Profile {
                api_url: Some("not a url".into()),
                token: Some("t".into()),
                ..Profile::default()
            },
        );
        assert!(matches!(
            profile_to_client(&config, Some("bad")),
            Err(ConfigError::Validation { .. })
        ));
    }
}
