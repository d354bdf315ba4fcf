#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sssonector_lib::config::load_from_path;
use sssonector_lib::telemetry::{init_tracing_with_otel, shutdown_tracing};
use sssonector_lib::transfer::ShutdownSignal;
use sssonector_lib::{app, TunnelError};

/// SSSonector: a point-to-point secure tunnel (TUN + mutually-authenticated
/// TLS) with token-bucket shaping and SNMP telemetry.
#[derive(Parser, Debug)]
#[command(name = "sssonector", author, version, about)]
struct Cli {
    /// Operating mode: server or client.
    #[arg(long = "mode", value_name = "server|client")]
    mode: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(long = "config", value_name = "PATH", default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding (or to hold) certificate material.
    #[arg(long = "keyfile", value_name = "DIR")]
    keyfile: Option<PathBuf>,

    /// Generate a CA plus server and client certificates and exit.
    #[arg(long = "keygen")]
    keygen: bool,

    /// Alias for `-keygen`: generate certificates only, then exit.
    #[arg(long = "generate-certs-only")]
    generate_certs_only: bool,

    /// Validate the certificate chain under `-keyfile`/`cert_dir` and exit.
    #[arg(long = "validate-certs")]
    validate_certs: bool,

    /// Run with ephemeral 15s-validity certificates for a connectivity
    /// smoke test; the process exits when the certificates expire.
    #[arg(long = "test-without-certs")]
    test_without_certs: bool,

    /// Print version information and exit.
    #[arg(long = "version")]
    print_version: bool,
}

/// Exit codes per spec §6: 0 success, 1 configuration error, 2 certificate
/// error, 3 adapter error, 4 network error, 5 runtime error.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_version {
        println!("sssonector {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    // `-keygen`/`-generate-certs-only`/`-validate-certs` are one-shot
    // operator tools that never load the tunnel config, so they fall back
    // to an env-driven log level instead of `cfg.logging`.
    let cert_dir = cli
        .keyfile
        .clone()
        .unwrap_or_else(|| PathBuf::from("./certs"));

    if cli.keygen || cli.generate_certs_only {
        init_tracing();
        return match app::keygen(&cert_dir) {
            Ok(()) => {
                info!(?cert_dir, "certificate generation complete");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    if cli.validate_certs {
        init_tracing();
        return match app::validate_certs(&cert_dir) {
            Ok(report) => {
                info!(?report, "certificate chain validated");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::from(5);
        }
    };

    runtime.block_on(run_tunnel(cli, cert_dir))
}

async fn run_tunnel(cli: Cli, cert_dir: PathBuf) -> ExitCode {
    // Parsing happens before the config-driven log level is known, so a
    // parse failure here is reported on stderr directly rather than through
    // `tracing` (whose subscriber is installed a few lines down, once we
    // know what level the operator asked for).
    let mut cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    if let Err(e) = init_tracing_with_otel(cfg.logging.level.clone(), cfg.logging.show_target, "warn".to_string()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(5);
    }

    if let Some(mode) = cli.mode.as_deref() {
        cfg.role = match mode.to_lowercase().as_str() {
            "server" => sssonector_lib::config::Role::Server,
            "client" => sssonector_lib::config::Role::Client,
            other => {
                error!(mode = other, "invalid -mode; expected server or client");
                return ExitCode::from(1);
            }
        };
    }
    if cli.keyfile.is_some() {
        cfg.cert_dir = cert_dir.to_string_lossy().into_owned();
    }
    if cli.test_without_certs {
        cfg.test_without_certs = true;
    }

    info!(role = ?cfg.role, config = ?cli.config, "starting sssonector");

    let shutdown = Arc::new(ShutdownSignal::new());
    let exit = match app::run(cfg, shutdown).await {
        Ok(()) => {
            info!("tunnel shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    };
    shutdown_tracing();
    exit
}

fn fail(e: &TunnelError) -> ExitCode {
    error!(error = %e, "sssonector exiting with error");
    ExitCode::from(e.exit_code() as u8)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
