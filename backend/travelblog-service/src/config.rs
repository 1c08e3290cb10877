/// Configuration management for the travel blog service
///
/// Configuration is read from environment variables (optionally seeded from a
/// `.env` file by the binary). Connection parameters for the document store and
/// object storage are fixed for the lifetime of the process.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Document store configuration
    pub documents: DocumentStoreConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Session token configuration
    pub auth: AuthConfig,
    /// Feed limits
    pub feed: FeedConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    pub backend: DocumentBackend,
    /// Database URL (postgres backend only)
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Project identifier, used as the default bucket name
    pub project_id: String,
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint override
    pub endpoint: Option<String>,
    /// Base URL that uploaded object keys are appended to
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub max_image_bytes: usize,
}

const DEV_JWT_SECRET: &str = "travelblog-development-secret";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let host = std::env::var("TRAVELBLOG_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = parse_env_or_default("TRAVELBLOG_PORT", 8080)?;

        let project_id =
            std::env::var("PROJECT_ID").unwrap_or_else(|_| "travelblog-dev".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host,
                port,
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            documents: DocumentStoreConfig {
                backend: match std::env::var("DOCUMENT_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .to_ascii_lowercase()
                    .as_str()
                {
                    "memory" => DocumentBackend::Memory,
                    "postgres" => DocumentBackend::Postgres,
                    other => return Err(format!("Unknown DOCUMENT_BACKEND '{}'", other)),
                },
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/travelblog".to_string()),
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            storage: StorageConfig {
                backend: match std::env::var("STORAGE_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .to_ascii_lowercase()
                    .as_str()
                {
                    "memory" => StorageBackend::Memory,
                    "s3" => StorageBackend::S3,
                    other => return Err(format!("Unknown STORAGE_BACKEND '{}'", other)),
                },
                bucket: std::env::var("STORAGE_BUCKET")
                    .unwrap_or_else(|_| format!("{}-images", project_id)),
                project_id,
                region: std::env::var("STORAGE_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("STORAGE_ENDPOINT")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
                public_base_url: std::env::var("STORAGE_PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}/api/v1/media", port)),
            },
            auth: {
                let jwt_secret = match std::env::var("JWT_SECRET") {
                    Ok(secret) if !secret.trim().is_empty() => secret,
                    _ if production => {
                        return Err("JWT_SECRET must be set in production".to_string())
                    }
                    _ => DEV_JWT_SECRET.to_string(),
                };

                if production && jwt_secret.len() < 32 {
                    return Err("JWT_SECRET must be at least 32 bytes in production".to_string());
                }

                AuthConfig {
                    jwt_secret,
                    session_ttl_secs: parse_env_or_default("SESSION_TTL_SECS", 3_600)?,
                }
            },
            feed: FeedConfig {
                max_image_bytes: parse_env_or_default("MAX_IMAGE_BYTES", 10 * 1024 * 1024)?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
