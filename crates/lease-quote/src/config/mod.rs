use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::pricing::PriceBounds;

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
    pub pricing: PricingConfig,
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
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::Compact,
        };

        let min = price_limit("LEASE_MIN_PRICE", "2000")?;
        let max = price_limit("LEASE_MAX_PRICE", "1000000")?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(ConfigError::InvertedPriceBounds { min, max });
            }
        }

        let settings_path = env::var("LEASE_SETTINGS_PATH")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);
        let admin_token = env::var("LEASE_ADMIN_TOKEN")
            .ok()
            .filter(|raw| !raw.trim().is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            pricing: PricingConfig {
                settings_path,
                price_bounds: PriceBounds::new(min, max),
                admin_token,
            },
        })
    }
}

/// Empty values turn the limit off.
fn price_limit(var: &'static str, default: &str) -> Result<Option<Decimal>, ConfigError> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match Decimal::from_str(raw) {
        Ok(value) if value > Decimal::ZERO => Ok(Some(value)),
        _ => Err(ConfigError::InvalidPrice {
            var,
            value: raw.to_string(),
        }),
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
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Where settings live, which prices are quotable, and who may edit settings.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// JSON document holding the settings; `None` keeps them in memory only.
    pub settings_path: Option<PathBuf>,
    pub price_bounds: PriceBounds,
    pub admin_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidPrice { var: &'static str, value: String },
    InvertedPriceBounds { min: Decimal, max: Decimal },
    SettingsPathRequired { command: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json' (got '{value}')")
            }
            ConfigError::InvalidPrice { var, value } => {
                write!(f, "{var} must be a positive decimal (got '{value}')")
            }
            ConfigError::InvertedPriceBounds { min, max } => {
                write!(
                    f,
                    "LEASE_MIN_PRICE ({min}) must not exceed LEASE_MAX_PRICE ({max})"
                )
            }
            ConfigError::SettingsPathRequired { command } => write!(
                f,
                "`{command}` needs LEASE_SETTINGS_PATH; in-memory settings are lost on exit"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::InvalidPrice { .. }
            | ConfigError::InvertedPriceBounds { .. }
            | ConfigError::SettingsPathRequired { .. } => None,
        }
    }
}
