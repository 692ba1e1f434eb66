//! Shared configuration for vitalwatch tools.
//!
//! One TOML file at the platform config dir, overridable through
//! `VITALWATCH_`-prefixed environment variables, translated into the
//! runtime `ClientConfig` / `RealtimeConfig` that never touch disk.
//! Nested keys use a double underscore, e.g.
//! `VITALWATCH_REALTIME__MAX_RECONNECT_ATTEMPTS=2`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use vitalwatch_api::{
    ClientConfig, EndpointTable, FallbackTable, RealtimeConfig, TlsMode, TransportConfig,
};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "VITALWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Api(#[from] vitalwatch_api::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Telemetry server base URL (e.g. "https://telemetry.example.com").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Hard per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a cached GET stays fresh.
    #[serde(default = "default_cache_window_ms")]
    pub cache_window_ms: u64,

    /// JSON file of `{ "<path>": <payload> }` served when a read fails.
    pub fallback_file: Option<PathBuf>,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification. Development servers only.
    #[serde(default)]
    pub insecure: bool,

    /// Default output format for the CLI.
    #[serde(default = "default_output")]
    pub output: String,

    /// Endpoint path overrides keyed by endpoint name, e.g.
    /// `stats = "/v2/stats"`.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default)]
    pub realtime: RealtimeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            cache_window_ms: default_cache_window_ms(),
            fallback_file: None,
            ca_cert: None,
            insecure: false,
            output: default_output(),
            endpoints: BTreeMap::new(),
            realtime: RealtimeSettings::default(),
        }
    }
}

/// The `[realtime]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Identity sent in the `register` frame.
    #[serde(default = "default_client_type")]
    pub client_type: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            client_type: default_client_type(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_cache_window_ms() -> u64 {
    30_000
}
fn default_output() -> String {
    "table".into()
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_reconnect_delay_ms() -> u64 {
    3_000
}
fn default_client_type() -> String {
    "dashboard".into()
}

// ── Translation to runtime config ───────────────────────────────────

impl Config {
    /// Parse and check `base_url`.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url: Url = self.base_url.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {}", self.base_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("expected http or https, got '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Build the HTTP client settings.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        let mut config = ClientConfig::new(self.base_url()?);
        config.timeout = Duration::from_millis(self.timeout_ms);
        config.cache_window = Duration::from_millis(self.cache_window_ms);
        config.endpoints = EndpointTable::with_overrides(&self.endpoints)?;
        config.transport = TransportConfig {
            tls,
            ..TransportConfig::default()
        };
        Ok(config)
    }

    /// Build the realtime channel settings.
    pub fn to_realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            max_reconnect_attempts: self.realtime.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.realtime.reconnect_delay_ms),
            client_type: self.realtime.client_type.clone(),
        }
    }

    /// Load the configured fallback file, if any.
    pub fn fallback_table(&self) -> Result<Option<FallbackTable>, ConfigError> {
        self.fallback_file
            .as_deref()
            .map(FallbackTable::from_file)
            .transpose()
            .map_err(ConfigError::from)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vitalwatch", "vitalwatch").map_or_else(
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
    p.push("vitalwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from an explicit file + environment. A missing file is
/// not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use vitalwatch_api::Endpoint;

    use super::*;

    #[test]
    fn defaults_match_client_defaults() {
        let cfg = Config::default();
        let client = cfg.to_client_config().unwrap();
        assert_eq!(client.timeout, vitalwatch_api::DEFAULT_TIMEOUT);
        assert_eq!(client.cache_window, vitalwatch_api::DEFAULT_CACHE_WINDOW);
        assert_eq!(client.transport.tls, TlsMode::System);

        let rt = cfg.to_realtime_config();
        assert_eq!(rt.max_reconnect_attempts, 5);
        assert_eq!(rt.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(rt.client_type, "dashboard");
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                base_url = "https://telemetry.example.com"
                timeout_ms = 4000

                [endpoints]
                stats = "/v2/stats"

                [realtime]
                client_type = "kiosk"
                "#,
            )?;
            jail.set_env("VITALWATCH_TIMEOUT_MS", "2500");
            jail.set_env("VITALWATCH_REALTIME__MAX_RECONNECT_ATTEMPTS", "2");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.base_url, "https://telemetry.example.com");
            assert_eq!(cfg.timeout_ms, 2500);
            assert_eq!(cfg.cache_window_ms, 30_000);
            assert_eq!(cfg.realtime.client_type, "kiosk");
            assert_eq!(cfg.realtime.max_reconnect_attempts, 2);

            let client = cfg.to_client_config().unwrap();
            assert_eq!(client.endpoints.path(Endpoint::Stats), "/v2/stats");
            assert_eq!(client.endpoints.path(Endpoint::Health), "/health");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn rejects_non_http_base_url() {
        let cfg = Config {
            base_url: "ftp://example.com".into(),
            ..Config::default()
        };
        assert!(matches!(
            cfg.to_client_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "base_url"
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = Config {
            timeout_ms: 0,
            ..Config::default()
        };
        assert!(cfg.to_client_config().is_err());
    }

    #[test]
    fn unknown_endpoint_override_is_an_error() {
        let mut cfg = Config::default();
        cfg.endpoints.insert("nonsense".into(), "/x".into());
        assert!(matches!(
            cfg.to_client_config(),
            Err(ConfigError::Api(vitalwatch_api::Error::UnknownEndpoint(_)))
        ));
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let cfg = Config {
            insecure: true,
            ca_cert: Some(PathBuf::from("/etc/ca.pem")),
            ..Config::default()
        };
        assert_eq!(
            cfg.to_client_config().unwrap().transport.tls,
            TlsMode::DangerAcceptInvalid
        );
    }

    #[test]
    fn fallback_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(&path, r#"{"/api/stats": {"total_employees": 0}}"#).unwrap();

        let cfg = Config {
            fallback_file: Some(path),
            ..Config::default()
        };
        assert_eq!(cfg.fallback_table().unwrap().unwrap().len(), 1);
        assert!(Config::default().fallback_table().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.realtime.reconnect_delay_ms = 500;

        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
