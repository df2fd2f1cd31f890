//! # wsbench - Main Entry Point
//!
//! 1. **Parse arguments**: clap derive `Args`
//! 2. **Initialize logging**: colorized console output, optional log file
//! 3. **Build config**: validated `BenchmarkConfig` from the arguments
//! 4. **Run**: one `BenchmarkRunner` run against the transport picked from the URL
//! 5. **Report**: print the summary, optionally write JSON
//!
//! Per-client failures never fail the process; only configuration and
//! output errors do.

use anyhow::Result;
use clap::Parser;
use wsbench::{
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::Args,
    logging,
    results::ResultsManager,
    transport::TransportFactory,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = logging::init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;

    info!("Starting wsbench {}", wsbench::VERSION);

    let config = BenchmarkConfig::from_args(&args)?;
    let transport = TransportFactory::for_address(&config.server_address)?;
    let results_manager = ResultsManager::new(args.output_file.as_deref());

    let runner = BenchmarkRunner::new(config, transport)?;
    let result = runner.run().await;

    println!("{}", result);
    results_manager.write(&result)?;

    Ok(())
}
