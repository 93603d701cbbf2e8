use std::env;
use std::path::PathBuf;

use crate::error::AppError;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub inference: InferenceConfig,
    pub progress: ProgressStoreConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Inference backend configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

/// Where per-student progress snapshots live
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressStoreConfig {
    /// Local SQLite database (see [`DatabaseConfig`])
    Sqlite,
    /// Remote persistence backend
    Http { base_url: String },
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration.
///
/// Retries only ever apply to GET requests. Batch submission and snapshot
/// writes are attempted exactly once.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let inference = InferenceConfig {
            base_url: env::var("INFERENCE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_token: env::var("INFERENCE_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        };

        let progress = match env::var("PROGRESS_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => ProgressStoreConfig::Sqlite,
            "http" => ProgressStoreConfig::Http {
                base_url: env::var("PROGRESS_BASE_URL")
                    .unwrap_or_else(|_| inference.base_url.clone()),
            },
            other => {
                return Err(AppError::Config {
                    message: format!("PROGRESS_STORE must be 'sqlite' or 'http', got '{}'", other),
                })
            }
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/progress.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
        };

        Ok(Config {
            inference,
            progress,
            database,
            logging,
            request,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
        }
    }
}
