use clap::Parser;
use garage_cosi_admin::CallContext;
use garage_cosi_core::{DriverConfig, EngineContext};
use garage_cosi_server::Driver;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "garage-cosi",
    version,
    about = "COSI bucket provisioning driver for Garage"
)]
struct Cli {
    /// JSON config file. Without it, settings come from the environment.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configured one.
    #[arg(long)]
    listen: Option<String>,

    /// Number of worker threads serving requests.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let loaded = match cli.config {
        Some(ref path) => DriverConfig::load(path),
        None => DriverConfig::from_env(),
    };
    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!("error validating config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    info!("starting {} with {config:?}", config.driver_name);

    let root = CallContext::background();
    let signal_root = root.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if signal_root.is_cancelled() {
            std::process::exit(1);
        }
        warn!("shutdown requested, cancelling in-flight calls");
        signal_root.cancel();
    }) {
        warn!("failed to install signal handler: {e}");
    }

    let driver = Arc::new(Driver::new(
        &config.driver_name,
        EngineContext::from_config(&config),
    ));
    match garage_cosi_server::run_server(&driver, &config.listen_addr, cli.workers, &root) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("error running the driver: {e}");
            ExitCode::FAILURE
        }
    }
}
