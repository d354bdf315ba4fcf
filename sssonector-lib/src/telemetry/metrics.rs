use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

/// A lock-free mirror of the counters exported over OpenTelemetry/Prometheus.
/// OTel instruments are write-only from the application's perspective; the
/// SNMP agent and the `/metrics`-adjacent internal consumers need to *read*
/// current values, so every hot-path update lands here too via relaxed
/// atomic stores (spec §4.7 "Reads for SNMP are atomic loads; transient
/// inconsistency between counters is acceptable").
#[derive(Default)]
struct Shadow {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    dropped_filter: AtomicU64,
    errors_total: AtomicU64,
    connection_errors: AtomicU64,
    protocol_errors: AtomicU64,
    active_sessions: AtomicU64,
    peak_sessions: AtomicU64,
    rate_limit_hits: AtomicU64,
    adjust_count: AtomicU64,
    cert_expiry_warnings_total: AtomicU64,
    current_rate_in: AtomicU64,
    current_rate_out: AtomicU64,
    rate_limit: AtomicU64,
    burst_limit: AtomicU64,
}

/// Point-in-time counter/gauge values, used by the SNMP agent's `.2`/`.3`/`.4`
/// OID subtrees (spec §4.7 OID layout).
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub current_sessions: u64,
    pub peak_sessions: u64,
    pub current_rate_in: u64,
    pub current_rate_out: u64,
    pub rate_limit: u64,
    pub burst_limit: u64,
    pub rate_limit_hits: u64,
    pub adjust_count: u64,
    pub errors_total: u64,
    pub connection_errors: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Data-plane and control-plane telemetry (spec §3 "Metrics Snapshot", §4.4
/// "rate_limit_hits"/"adjust_count", §4.5 "dropped_filter").
///
/// Every counter here is monotonic and safe to call from any of the Transfer
/// Engine's concurrent activities; gauges are last-write-wins.
#[derive(Clone)]
pub struct Metrics {
    start: Instant,
    shadow: Arc<Shadow>,

    bytes_in: Counter<u64>,
    bytes_out: Counter<u64>,
    packets_in: Counter<u64>,
    packets_out: Counter<u64>,
    dropped_filter: Counter<u64>,
    errors_total: Counter<u64>,

    active_sessions: UpDownCounter<i64>,

    rate_limit_hits: Counter<u64>,
    adjust_count: Counter<u64>,
    cert_expiry_warnings_total: Counter<u64>,

    uptime_seconds: Gauge<u64>,
    current_rate_in: Gauge<u64>,
    current_rate_out: Gauge<u64>,
    rate_overhead_factor: Gauge<f64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            start: Instant::now(),
            shadow: Arc::new(Shadow::default()),

            bytes_in: meter
                .u64_counter("sssonector_bytes_in_total")
                .with_description("Total bytes read from the tunnel transport (server perspective: client upload)")
                .build(),
            bytes_out: meter
                .u64_counter("sssonector_bytes_out_total")
                .with_description("Total bytes written to the tunnel transport")
                .build(),
            packets_in: meter
                .u64_counter("sssonector_packets_in_total")
                .with_description("Total IP packets received from the virtual interface and forwarded")
                .build(),
            packets_out: meter
                .u64_counter("sssonector_packets_out_total")
                .with_description("Total IP packets written to the virtual interface")
                .build(),
            dropped_filter: meter
                .u64_counter("sssonector_dropped_filter_total")
                .with_description("Packets dropped by the protocol filter")
                .build(),
            errors_total: meter
                .u64_counter("sssonector_errors_total")
                .with_description("Total errors encountered across all subsystems")
                .build(),

            active_sessions: meter
                .i64_up_down_counter("sssonector_active_sessions")
                .with_description("Number of currently active tunnel sessions")
                .build(),

            rate_limit_hits: meter
                .u64_counter("sssonector_rate_limit_hits_total")
                .with_description("Number of times a token bucket acquire exceeded its wait deadline")
                .build(),
            adjust_count: meter
                .u64_counter("sssonector_rate_adjust_total")
                .with_description("Number of accepted dynamic rate adjustments")
                .build(),
            cert_expiry_warnings_total: meter
                .u64_counter("sssonector_cert_expiry_warnings_total")
                .with_description("Number of certificate expiry warnings emitted by the expiry watcher")
                .build(),

            uptime_seconds: meter
                .u64_gauge("sssonector_uptime_seconds")
                .with_description("Seconds since the tunnel process started")
                .build(),
            current_rate_in: meter
                .u64_gauge("sssonector_current_rate_in_bps")
                .with_description("Current effective ingress rate limit in bits per second")
                .build(),
            current_rate_out: meter
                .u64_gauge("sssonector_current_rate_out_bps")
                .with_description("Current effective egress rate limit in bits per second")
                .build(),
            rate_overhead_factor: meter
                .f64_gauge("sssonector_rate_overhead_factor")
                .with_description("TCP overhead compensation factor applied to configured rate limits")
                .build(),
        }
    }

    pub fn record_bytes_in(&self, n: u64) {
        self.bytes_in.add(n, &[]);
        self.shadow.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_bytes_out(&self, n: u64) {
        self.bytes_out.add(n, &[]);
        self.shadow.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_packet_in(&self) {
        self.packets_in.add(1, &[]);
        self.shadow.packets_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_out(&self) {
        self.packets_out.add(1, &[]);
        self.shadow.packets_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_filter(&self) {
        self.dropped_filter.add(1, &[]);
        self.shadow.dropped_filter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.add(1, &[]);
        self.shadow.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_error(&self) {
        self.record_error();
        self.shadow.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.record_error();
        self.shadow.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.active_sessions.add(1, &[]);
        let now = self.shadow.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        self.shadow.peak_sessions.fetch_max(now, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.add(-1, &[]);
        self.shadow.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_sessions_count(&self) -> u64 {
        self.shadow.active_sessions.load(Ordering::Relaxed)
    }

    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.add(1, &[]);
        self.shadow.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adjust(&self) {
        self.adjust_count.add(1, &[]);
        self.shadow.adjust_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cert_expiry_warning(&self) {
        self.cert_expiry_warnings_total.add(1, &[]);
        self.shadow.cert_expiry_warnings_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Refreshes the rate/overhead gauges after a dynamic rate adjustment or
    /// at startup (spec §4.4 "current_rate_in"/"current_rate_out").
    pub fn set_rates(&self, rate_in_bps: u64, rate_out_bps: u64, rate_overhead_factor: f64) {
        self.current_rate_in.record(rate_in_bps, &[]);
        self.current_rate_out.record(rate_out_bps, &[]);
        self.rate_overhead_factor.record(rate_overhead_factor, &[]);
        self.shadow.current_rate_in.store(rate_in_bps, Ordering::Relaxed);
        self.shadow.current_rate_out.store(rate_out_bps, Ordering::Relaxed);
        self.shadow.rate_limit.store(rate_in_bps.max(rate_out_bps), Ordering::Relaxed);
    }

    pub fn set_burst_limit(&self, burst_bytes: u64) {
        self.shadow.burst_limit.store(burst_bytes, Ordering::Relaxed);
    }

    /// Refreshes the uptime gauge. Called from the periodic snapshot tick
    /// (spec §3 "Metrics Snapshot is refreshed at a fixed interval").
    pub fn tick_uptime(&self) {
        self.uptime_seconds.record(self.start.elapsed().as_secs(), &[]);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    /// A consistent-enough point-in-time view for the SNMP agent.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let s = &self.shadow;
        MetricsSnapshot {
            bytes_in: s.bytes_in.load(Ordering::Relaxed),
            bytes_out: s.bytes_out.load(Ordering::Relaxed),
            packets_in: s.packets_in.load(Ordering::Relaxed),
            packets_out: s.packets_out.load(Ordering::Relaxed),
            current_sessions: s.active_sessions.load(Ordering::Relaxed),
            peak_sessions: s.peak_sessions.load(Ordering::Relaxed),
            current_rate_in: s.current_rate_in.load(Ordering::Relaxed),
            current_rate_out: s.current_rate_out.load(Ordering::Relaxed),
            rate_limit: s.rate_limit.load(Ordering::Relaxed),
            burst_limit: s.burst_limit.load(Ordering::Relaxed),
            rate_limit_hits: s.rate_limit_hits.load(Ordering::Relaxed),
            adjust_count: s.adjust_count.load(Ordering::Relaxed),
            errors_total: s.errors_total.load(Ordering::Relaxed),
            connection_errors: s.connection_errors.load(Ordering::Relaxed),
            protocol_errors: s.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

/// Builds the OpenTelemetry meter provider backed by a Prometheus registry
/// and returns the [`Metrics`] instrument set alongside the registry the
/// `/metrics` HTTP handler scrapes.
pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter().with_registry(registry.clone()).build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("sssonector");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}
