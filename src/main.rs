use std::{process::ExitCode, time::Duration};

use carbon_intensity::{CarbonIntensityService, Fetcher, DEFAULT_ENDPOINT};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Prints the carbon intensity of the last 24 hours for a grid zone and
/// writes it to `carbon_intensity_data.csv` and `carbon_intensity_data.html`.
#[derive(Debug, Parser)]
#[command(name = "carbon-intensity", version, about, long_about = None)]
#[command(after_help = "Exit status: 0 when the report is written or the history is empty, \
1 when the history could not be fetched or used, or on an I/O error.")]
struct Args {
    /// Electricity Maps API token
    #[arg(long, env = "ELECTRICITYMAP_API_TOKEN", hide_env_values = true)]
    token: String,

    /// Grid zone to query
    #[arg(long, env = "CARBON_REGION", default_value = "GB")]
    region: String,

    /// History endpoint
    #[arg(long, env = "CARBON_API_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Give up on the request after this many seconds
    #[arg(long, env = "CARBON_HTTP_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> miette::Result<ExitCode> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut fetcher = Fetcher::new(args.token).with_endpoint(args.endpoint);
    if let Some(secs) = args.timeout_secs {
        fetcher = fetcher.with_timeout(Duration::from_secs(secs));
    }
    let service = CarbonIntensityService::from_fetcher(fetcher, args.region);

    let outcome = service.run(&mut std::io::stdout().lock())?;
    Ok(ExitCode::from(outcome.exit_code()))
}
