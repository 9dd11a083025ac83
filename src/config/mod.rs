mod settings;

pub use settings::{
    FanoutConfig, RedisConfig, RegistryConfig, ServerConfig, Settings, TransportConfig,
};
