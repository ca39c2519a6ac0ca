use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub defaults: CapacityDefaults,
    pub gate: GateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// "postgres" or "memory". Memory keeps everything in-process; useful
    /// for local runs and demos.
    pub driver: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Seed values for the persisted capacity config when none exists yet.
#[derive(Debug, Deserialize, Clone)]
pub struct CapacityDefaults {
    pub capacity: i32,
    pub late_capacity: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default = "default_horizon_days")]
    pub late_search_horizon_days: i64,
}

fn default_horizon_days() -> i64 {
    7
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration, always present.
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // APP_SERVER__PORT=9000 style environment overrides.
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
