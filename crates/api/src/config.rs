//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 3000)
//! - `JWT_TTL_SECS` - Access token lifetime (default: 86400)
//! - `UPLOAD_DIR` - Root directory for uploaded files (default: uploads)
//! - `UPLOAD_MAX_BYTES` - Per-file upload limit (default: 5 MiB)
//! - `CORS_ORIGINS` - Comma-separated allowed origins for the admin frontend
//! - `ELASTICSEARCH_URL` - Enables product search indexing (e.g., <http://localhost:9200>)
//! - `ELASTICSEARCH_INDEX` - Index name (default: products)
//! - `SCRAPER_TIMEOUT_SECS` - Price scraper fetch timeout (default: 10)
//! - `SCRAPER_USER_AGENT` - User agent sent by the price scraper
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_JWT_TTL_SECS: u64 = 86_400;
const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_SCRAPER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCRAPER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
    /// Allowed CORS origins; empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    /// Elasticsearch settings; `None` disables search indexing entirely.
    pub search: Option<SearchConfig>,
    pub scraper: ScraperConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of human-readable text.
    pub json_logs: bool,
}

/// Bearer token signing configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Local-disk upload storage.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Elasticsearch connection.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub url: String,
    pub index: String,
}

/// Price scraper HTTP settings.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_SCRAPER_TIMEOUT_SECS),
            user_agent: DEFAULT_SCRAPER_USER_AGENT.to_owned(),
        }
    }
}

impl ApiConfig {
    /// Configuration with every optional setting at its default.
    ///
    /// Used by [`Self::from_env`] as the starting point, and by tests.
    #[must_use]
    pub fn with_defaults(database_url: SecretString, jwt_secret: SecretString) -> Self {
        Self {
            database_url,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl: Duration::from_secs(DEFAULT_JWT_TTL_SECS),
            },
            uploads: UploadConfig {
                dir: PathBuf::from("uploads"),
                max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            },
            cors_origins: Vec::new(),
            search: None,
            scraper: ScraperConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            json_logs: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let mut config = Self::with_defaults(database_url, jwt_secret);

        config.host = parse_env("API_HOST", config.host)?;
        config.port = parse_env("API_PORT", config.port)?;
        config.jwt.ttl = Duration::from_secs(parse_env("JWT_TTL_SECS", DEFAULT_JWT_TTL_SECS)?);
        if let Some(dir) = get_optional_env("UPLOAD_DIR") {
            config.uploads.dir = PathBuf::from(dir);
        }
        config.uploads.max_bytes = parse_env("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?;
        config.cors_origins = get_optional_env("CORS_ORIGINS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        config.search = get_optional_env("ELASTICSEARCH_URL").map(|url| SearchConfig {
            url: url.trim_end_matches('/').to_owned(),
            index: get_env_or_default("ELASTICSEARCH_INDEX", "products"),
        });
        config.scraper.timeout = Duration::from_secs(parse_env(
            "SCRAPER_TIMEOUT_SECS",
            DEFAULT_SCRAPER_TIMEOUT_SECS,
        )?);
        if let Some(agent) = get_optional_env("SCRAPER_USER_AGENT") {
            config.scraper.user_agent = agent;
        }
        config.sentry_dsn = get_optional_env("SENTRY_DSN");
        config.sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        config.sentry_sample_rate = parse_env("SENTRY_SAMPLE_RATE", 1.0)?;
        config.sentry_traces_sample_rate = parse_env("SENTRY_TRACES_SAMPLE_RATE", 1.0)?;
        config.json_logs = get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        Ok(config)
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(key).map(SecretString::from)
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let len = secret.expose_secret().len();
    if len < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} characters (got {len})"),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy values.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("zzzzzz").abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Qm7$kP2!vX9@wR4#") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_rejects_placeholder_secret() {
        let err = validate_secret_strength("changeme-changeme-changeme-123456", "JWT_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(ref var, _) if var == "JWT_SECRET"));
    }

    #[test]
    fn test_rejects_low_entropy_secret() {
        assert!(validate_secret_strength("abababababababababababababababab", "JWT_SECRET").is_err());
    }

    #[test]
    fn test_accepts_random_secret() {
        assert!(validate_secret_strength("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js", "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_secret_length() {
        let short = SecretString::from("Zx4Rt7Np1W");
        assert!(validate_secret_length(&short, "JWT_SECRET").is_err());
        let long = SecretString::from("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!");
        assert!(validate_secret_length(&long, "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list("https://admin.shop.test, ,http://localhost:5173,"),
            vec!["https://admin.shop.test", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::with_defaults(
            SecretString::from("postgres://localhost/emporium"),
            SecretString::from("k9Vq2Lm8Zx4Rt7Np1Wc6Hy3Bd5Fg0Js!"),
        );
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.jwt.ttl, Duration::from_secs(86_400));
        assert_eq!(config.scraper.timeout, Duration::from_secs(10));
        assert!(config.search.is_none());
    }

    #[test]
    fn test_jwt_debug_redacts_secret() {
        let jwt = JwtConfig {
            secret: SecretString::from("very-private-signing-key"),
            ttl: Duration::from_secs(60),
        };
        let debug_output = format!("{jwt:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very-private-signing-key"));
    }
}
