use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Storage backend: "redis" (durable, shared across workers) or "memory"
    #[serde(default = "default_registry_backend")]
    pub backend: String,
    /// Key prefix for registry data in Redis
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Room used when a connect or send carries no room id
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Entry lifetime; the safety net for missed disconnect events
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl_seconds: u64,
    /// Interval for the expiry sweeper task
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Push backend: "http" (gateway management endpoint) or "channel" (in-process)
    #[serde(default = "default_transport_backend")]
    pub backend: String,
    /// Gateway management endpoint, e.g. https://gateway.example.com/prod
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP client request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Buffer size per connection for the channel backend
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Maximum number of in-flight deliveries per broadcast
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    /// Per-member delivery timeout in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_registry_backend() -> String {
    "memory".to_string()
}

fn default_key_prefix() -> String {
    "roomcast:registry".to_string()
}

fn default_room() -> String {
    "lobby".to_string()
}

fn default_connection_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_transport_backend() -> String {
    "channel".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    64
}

fn default_max_concurrent_sends() -> usize {
    100
}

fn default_send_timeout_ms() -> u64 {
    5000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("registry.backend", "memory")?
            .set_default("registry.default_room", "lobby")?
            .set_default("transport.backend", "channel")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, REDIS_URL, REGISTRY_BACKEND, TRANSPORT_ENDPOINT, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RegistryConfig {
    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl FanoutConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: default_registry_backend(),
            key_prefix: default_key_prefix(),
            default_room: default_room(),
            connection_ttl_seconds: default_connection_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: default_transport_backend(),
            endpoint: None,
            request_timeout_ms: default_request_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sends: default_max_concurrent_sends(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let registry = RegistryConfig::default();
        assert_eq!(registry.default_room, "lobby");
        assert_eq!(registry.connection_ttl_seconds, 86_400);
    }

    #[test]
    fn test_duration_helpers() {
        let fanout = FanoutConfig::default();
        assert_eq!(fanout.send_timeout(), Duration::from_millis(5000));

        let registry = RegistryConfig::default();
        assert_eq!(registry.connection_ttl(), Duration::from_secs(86_400));
    }
}
