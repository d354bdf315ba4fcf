mod loader;
mod monitoring;
mod rate_limit;
mod root;
mod telemetry;
mod timeout;
mod tls;
mod tunnel;
mod validator;

pub use loader::load_from_path;
pub use monitoring::{ObservabilityConfig, SnmpConfig};
pub use rate_limit::{DynamicRateConfig, RateLimitConfig};
pub use root::{Config, RetryConfig};
pub use telemetry::LoggingConfig;
pub use timeout::TimeoutConfig;
pub use tls::{SessionResumptionConfig, TlsConfig, TlsOptions, TlsVersion};
pub use tunnel::{EndpointConfig, InterfaceConfig, ProtocolFilterConfig, Role};
pub use validator::validate_config;
