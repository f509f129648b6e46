/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, store 接続先, scope tree の場所など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::gate::scope::{ScopeDirectives, ScopeError, ScopeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which identity store backs the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Valkey,
    // In-process, empty map. Local development only.
    Memory,
}

/// Key-value store connection parameters (global, shared by all scopes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    pub host: String,
    pub port: u16,
}

impl StoreEndpoint {
    pub fn redis_url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}/", self.host, self.port)
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }
}

/// Where the per-scope gate directives come from. Re-read on reload.
#[derive(Debug, Clone)]
pub enum ScopeSource {
    File(PathBuf),
    Env,
}

impl ScopeSource {
    pub fn load(&self) -> Result<ScopeTable, ScopeError> {
        match self {
            ScopeSource::File(path) => ScopeTable::from_file(path),
            ScopeSource::Env => {
                let root = root_directives(|key| std::env::var(key).ok())?;
                ScopeTable::build(&root)
            }
        }
    }
}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub store_kind: StoreKind,
    pub store: StoreEndpoint,
    pub store_timeout: Duration,

    pub request_timeout: Duration,
    pub scopes: ScopeSource,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let store_kind = match std::env::var("AUTH_TOKEN_STORE")
            .unwrap_or_else(|_| "valkey".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "valkey" | "redis" => StoreKind::Valkey,
            "memory" => StoreKind::Memory,
            _ => return Err(ConfigError::Invalid("AUTH_TOKEN_STORE")),
        };

        let host =
            std::env::var("AUTH_TOKEN_REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        if host.is_empty() {
            return Err(ConfigError::Missing("AUTH_TOKEN_REDIS_HOST"));
        }

        let redis_port: u16 = parse_var(
            "AUTH_TOKEN_REDIS_PORT",
            std::env::var("AUTH_TOKEN_REDIS_PORT").ok(),
            6379,
        )?;

        let store_timeout_ms = parse_timeout(
            "AUTH_TOKEN_STORE_TIMEOUT_MS",
            std::env::var("AUTH_TOKEN_STORE_TIMEOUT_MS").ok(),
            500,
        )?;

        let request_timeout_seconds = parse_timeout(
            "HTTP_REQUEST_TIMEOUT_SECONDS",
            std::env::var("HTTP_REQUEST_TIMEOUT_SECONDS").ok(),
            30,
        )?;

        let scopes = match std::env::var("AUTH_TOKEN_SCOPES_FILE") {
            Ok(path) if !path.trim().is_empty() => ScopeSource::File(PathBuf::from(path)),
            _ => ScopeSource::Env,
        };

        Ok(Self {
            addr,
            app_env,
            store_kind,
            store: StoreEndpoint {
                host,
                port: redis_port,
            },
            store_timeout: Duration::from_millis(store_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_seconds),
            scopes,
        })
    }
}

// Unset falls back to `default`; set but unparsable is an error, never a silent default.
fn parse_var<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
    }
}

// A zero timeout would fail every store lookup (or answer every request with 408).
fn parse_timeout(
    key: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match parse_var(key, value, default)? {
        0 => Err(ConfigError::Invalid(key)),
        n => Ok(n),
    }
}

/// Root scope directives from `AUTH_TOKEN_*` variables (used when no scope file is set).
fn root_directives(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ScopeDirectives, ScopeError> {
    let enabled = match lookup("AUTH_TOKEN_ENABLED") {
        None => None,
        Some(value) => Some(parse_flag(&value).ok_or(ScopeError::InvalidFlag {
            key: "AUTH_TOKEN_ENABLED",
            value,
        })?),
    };

    Ok(ScopeDirectives {
        path: None,
        enabled,
        header_name: lookup("AUTH_TOKEN_HEADER_NAME"),
        cookie_name: lookup("AUTH_TOKEN_COOKIE_NAME"),
        redirect_location: lookup("AUTH_TOKEN_REDIRECT_LOCATION"),
        scopes: Vec::new(),
    })
}

// on/off flag; also accepts true/false, yes/no and 1/0.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn numeric_vars_default_when_unset_and_fail_when_garbled() {
        assert_eq!(parse_var::<u64>("AUTH_TOKEN_STORE_TIMEOUT_MS", None, 500).ok(), Some(500));
        assert_eq!(
            parse_var::<u64>("AUTH_TOKEN_STORE_TIMEOUT_MS", Some(" 750 ".into()), 500).ok(),
            Some(750)
        );

        let err = parse_var::<u64>("AUTH_TOKEN_STORE_TIMEOUT_MS", Some("5s".into()), 500)
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Invalid("AUTH_TOKEN_STORE_TIMEOUT_MS")));

        let err = parse_var::<u16>("AUTH_TOKEN_REDIS_PORT", Some("70000".into()), 6379)
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Invalid("AUTH_TOKEN_REDIS_PORT")));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let err = parse_timeout("HTTP_REQUEST_TIMEOUT_SECONDS", Some("0".into()), 30)
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Invalid("HTTP_REQUEST_TIMEOUT_SECONDS")));

        assert_eq!(parse_timeout("HTTP_REQUEST_TIMEOUT_SECONDS", None, 30).ok(), Some(30));
    }

    #[test]
    fn config_error_names_offending_variable() {
        assert_eq!(
            ConfigError::Invalid("HTTP_REQUEST_TIMEOUT_SECONDS").to_string(),
            "invalid configuration: HTTP_REQUEST_TIMEOUT_SECONDS"
        );
        assert_eq!(
            ConfigError::Missing("AUTH_TOKEN_REDIS_HOST").to_string(),
            "missing configuration: AUTH_TOKEN_REDIS_HOST"
        );
    }

    #[test]
    fn flags_accept_on_off_spellings() {
        assert_eq!(parse_flag("on"), Some(true));
        assert_eq!(parse_flag(" OFF "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn root_directives_from_env_vars() {
        let root = root_directives(lookup(&[
            ("AUTH_TOKEN_ENABLED", "on"),
            ("AUTH_TOKEN_HEADER_NAME", "X-Auth-Token"),
            ("AUTH_TOKEN_REDIRECT_LOCATION", "/login"),
        ]))
        .expect("valid directives");

        let table = ScopeTable::build(&root).expect("valid scope");
        let config = table.select("/");
        assert!(config.enabled);
        assert!(config.header_name.is_some());
        assert_eq!(config.redirect_location, "/login");
    }

    #[test]
    fn unset_env_leaves_gate_disabled() {
        let root = root_directives(lookup(&[])).expect("valid directives");
        assert!(!ScopeTable::build(&root).expect("valid scope").select("/").enabled);
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let err = root_directives(lookup(&[("AUTH_TOKEN_ENABLED", "sometimes")]))
            .expect_err("must fail");
        assert!(matches!(err, ScopeError::InvalidFlag { key: "AUTH_TOKEN_ENABLED", .. }));
    }

    #[test]
    fn redis_url_brackets_ipv6_hosts() {
        let v4 = StoreEndpoint {
            host: "10.0.0.5".to_string(),
            port: 6380,
        };
        let v6 = StoreEndpoint {
            host: "::1".to_string(),
            port: 6379,
        };

        assert_eq!(v4.redis_url(), "redis://10.0.0.5:6380/");
        assert_eq!(v6.redis_url(), "redis://[::1]:6379/");
    }
}
