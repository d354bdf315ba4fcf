use serde::Deserialize;

/// Application-level structured logging configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn", "error". Can be overridden via
    /// RUST_LOG at runtime.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub show_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
