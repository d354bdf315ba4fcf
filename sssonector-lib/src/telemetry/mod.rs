//! Metrics & SNMP Surface (spec §4.7): OpenTelemetry instruments backed by a
//! Prometheus registry, exposed over an HTTP observability endpoint, plus a
//! hand-rolled SNMPv2c agent for operators without a Prometheus scraper.

pub mod health;
pub mod metrics;
pub mod metrics_handler;
pub mod server;
pub mod snmp;
pub mod tracing;

pub use health::{health_check_response, live_check_response, ready_check_response};
pub use metrics::{init_metrics, Metrics};
pub use metrics_handler::handle_metrics;
pub use server::start_observability_server;
pub use snmp::SnmpAgent;
pub use tracing::{init_tracing_with_otel, shutdown_tracing};
