use std::path::PathBuf;

use crate::engine::orchestrator::DEFAULT_CONCURRENCY;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for source images and generated artifacts.
    pub data_dir: PathBuf,
    /// Base URL of the rendering service.
    pub render_api_url: String,
    /// Bearer token for the rendering service.
    pub render_api_key: String,
    /// Provider calls in flight per shoot.
    pub generation_concurrency: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `DATA_DIR`               | `./data`                |
    /// | `RENDER_API_URL`         | `http://localhost:9800` |
    /// | `RENDER_API_KEY`         | (empty)                 |
    /// | `GENERATION_CONCURRENCY` | `4`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()));

        let render_api_url =
            std::env::var("RENDER_API_URL").unwrap_or_else(|_| "http://localhost:9800".into());

        let render_api_key = std::env::var("RENDER_API_KEY").unwrap_or_default();

        let generation_concurrency: usize = std::env::var("GENERATION_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_CONCURRENCY.to_string())
            .parse()
            .expect("GENERATION_CONCURRENCY must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            render_api_url,
            render_api_key,
            generation_concurrency,
        }
    }
}
