use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::scales::{CatalogSettings, DocumentDefaults};

const DEFAULT_SCALE_TAGS: &str = "personality,mood,wellbeing,relationships,cognition";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            catalog: CatalogConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where scale definitions are read from and how often they are refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub scales_dir: PathBuf,
    pub default_language: String,
    pub known_tags: Vec<String>,
    /// `None` disables periodic refresh.
    pub refresh_interval: Option<Duration>,
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let scales_dir = env::var("APP_SCALES_DIR").unwrap_or_else(|_| "scales".to_string());
        let default_language =
            env::var("APP_DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string());
        let known_tags = parse_tags(
            &env::var("APP_SCALE_TAGS").unwrap_or_else(|_| DEFAULT_SCALE_TAGS.to_string()),
        );
        let refresh_secs = env::var("APP_CATALOG_REFRESH_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidRefreshInterval)?;

        Ok(Self {
            scales_dir: PathBuf::from(scales_dir),
            default_language,
            known_tags,
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        })
    }

    pub fn settings(&self) -> CatalogSettings {
        CatalogSettings {
            scales_dir: self.scales_dir.clone(),
            defaults: DocumentDefaults {
                known_tags: self.known_tags.clone(),
                default_language: self.default_language.clone(),
            },
        }
    }
}

fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRefreshInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRefreshInterval => write!(
                f,
                "APP_CATALOG_REFRESH_SECS must be a non-negative number of seconds"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidRefreshInterval => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
