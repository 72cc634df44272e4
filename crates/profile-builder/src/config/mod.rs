use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub storage: StorageConfig,
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

        let artifact_base_url = env::var("APP_ARTIFACT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_ARTIFACT_BASE_URL.to_string());
        let bucket_folders = match env::var("APP_STORAGE_BUCKETS") {
            Ok(raw) => parse_bucket_folders(&raw)?,
            Err(_) => BTreeMap::new(),
        };
        let drive_service_account_key = env::var("APP_DRIVE_SERVICE_ACCOUNT_KEY")
            .ok()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        if !bucket_folders.is_empty() && drive_service_account_key.is_none() {
            return Err(ConfigError::MissingDriveCredentials);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                artifact_base_url: artifact_base_url.trim_end_matches('/').to_string(),
                bucket_folders,
                drive_service_account_key,
            },
        })
    }
}

const DEFAULT_ARTIFACT_BASE_URL: &str = "memory://artifacts";

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

/// Object store settings shared by the artifact store adapters.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Prefix for URLs minted by the in-memory store.
    pub artifact_base_url: String,
    /// Logical bucket name to Google Drive folder id. Empty keeps artifacts in memory.
    pub bucket_folders: BTreeMap<String, String>,
    /// Service-account key used to reach Google Drive.
    pub drive_service_account_key: Option<PathBuf>,
}

impl StorageConfig {
    pub fn uses_drive(&self) -> bool {
        !self.bucket_folders.is_empty()
    }
}

fn parse_bucket_folders(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut folders = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (bucket, folder) = entry
            .split_once('=')
            .map(|(bucket, folder)| (bucket.trim(), folder.trim()))
            .filter(|(bucket, folder)| !bucket.is_empty() && !folder.is_empty())
            .ok_or_else(|| ConfigError::InvalidBucketMapping(entry.to_string()))?;
        folders.insert(bucket.to_string(), folder.to_string());
    }
    Ok(folders)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBucketMapping(String),
    MissingDriveCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBucketMapping(entry) => write!(
                f,
                "APP_STORAGE_BUCKETS entry '{entry}' must look like bucket=folder_id"
            ),
            ConfigError::MissingDriveCredentials => write!(
                f,
                "APP_STORAGE_BUCKETS requires APP_DRIVE_SERVICE_ACCOUNT_KEY"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidBucketMapping(_)
            | ConfigError::MissingDriveCredentials => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
