use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

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

const DEFAULT_NOTE_LOOKBACK_HOURS: i64 = 168;
const DEFAULT_SCAN_PAGE_SIZE: usize = 100;
const MAX_SCAN_PAGE_SIZE: usize = 1000;

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub compliance: ComplianceConfig,
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

        let note_lookback_hours = match env::var("CARE_NOTE_LOOKBACK_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::InvalidLookback { value: raw })?,
            Err(_) => DEFAULT_NOTE_LOOKBACK_HOURS,
        };

        let scan_page_size = match env::var("CARE_SCAN_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| (1..=MAX_SCAN_PAGE_SIZE).contains(size))
                .ok_or(ConfigError::InvalidPageSize { value: raw })?,
            Err(_) => DEFAULT_SCAN_PAGE_SIZE,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            compliance: ComplianceConfig {
                note_lookback_hours,
                scan_page_size,
            },
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Operator defaults for the compliance scans. Callers may still pass their own lookback.
#[derive(Debug, Clone)]
pub struct ComplianceConfig {
    pub note_lookback_hours: i64,
    pub scan_page_size: usize,
}

impl ComplianceConfig {
    pub fn note_lookback(&self) -> Duration {
        Duration::hours(self.note_lookback_hours)
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            note_lookback_hours: DEFAULT_NOTE_LOOKBACK_HOURS,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLookback { value: String },
    InvalidPageSize { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLookback { value } => write!(
                f,
                "CARE_NOTE_LOOKBACK_HOURS must be a positive number of hours (got '{}')",
                value
            ),
            ConfigError::InvalidPageSize { value } => write!(
                f,
                "CARE_SCAN_PAGE_SIZE must be between 1 and {} (got '{}')",
                MAX_SCAN_PAGE_SIZE, value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLookback { .. }
            | ConfigError::InvalidPageSize { .. } => None,
        }
    }
}
