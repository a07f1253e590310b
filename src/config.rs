use serde::Deserialize;
use std::net::SocketAddr;

use crate::store::DatasetStore;
use crate::transform::Pipeline;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub datasets: DatasetsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

// Where the static collections are loaded from at startup
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetsConfig {
    pub data_dir: String,
    pub users_file: String,
    pub posts_file: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SERVER"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "Tokio-Hyper/1.0")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("datasets.data_dir", "db")?
            .set_default("datasets.users_file", "users.json")?
            .set_default("datasets.posts_file", "posts.json")?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Shared application state: configuration, the immutable dataset store and
/// the startup-validated transform pipeline.
///
/// Everything here is read-only after startup, so connections share it
/// through an `Arc` without any locking.
pub struct AppState {
    pub config: Config,
    pub store: DatasetStore,
    pub pipeline: Pipeline,
}

impl AppState {
    pub const fn new(config: Config, store: DatasetStore, pipeline: Pipeline) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::load().unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.datasets.data_dir, "db");
        assert_eq!(cfg.datasets.users_file, "users.json");
        assert_eq!(cfg.datasets.posts_file, "posts.json");
        assert!(cfg.logging.access_log);
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::load().unwrap();
        let addr = cfg.get_socket_addr().unwrap();
        assert_eq!(addr.port(), cfg.server.port);
    }
}
