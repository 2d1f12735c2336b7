use detection::DetectionConfig;
use detection::config::parse_var;
use std::env;

pub use common::Environment;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Load the model before accepting requests instead of on the first `/detect`.
    pub preload_model: bool,
    pub max_body_bytes: usize,
    pub otel_endpoint: Option<String>,
    pub detection: DetectionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            preload_model: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            otel_endpoint: None,
            detection: DetectionConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            environment: Environment::from_env(),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            preload_model: parse_flag("PRELOAD_MODEL", defaults.preload_model)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            otel_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            detection: DetectionConfig::from_env()?,
        };

        if config.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be positive");
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("invalid value {:?} for {}: expected true or false", other, name),
        },
        Err(_) => Ok(default),
    }
}
