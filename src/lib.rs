//! # wsbench Library
//!
//! A load-generation harness for bidirectional, message-based network
//! services. It opens many concurrent connections, drives a fixed
//! request/response workload over each, and reports latency and throughput
//! statistics.
//!
//! ## Architecture Overview
//!
//! - `benchmark`: `BenchmarkRunner` fans out one worker per client and joins them
//! - `worker`: `ClientWorker`, the per-client jitter/connect/message state machine
//! - `metrics`: the shared `MeasurementCollector` and nearest-rank statistics
//! - `transport`: the `Transport` abstraction plus WebSocket and TCP implementations
//! - `results`: `RunResult`, the textual report, and JSON output
//! - `cli`, `logging`, `utils`: argument parsing, tracing setup, formatting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use wsbench::{run_benchmark, BenchmarkConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig::new("echo", "ws://localhost:8080/ws", 100, 1000);
//!     let result = run_benchmark(config).await?;
//!
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

/// Benchmark orchestration: configuration and the run/join/summarize cycle
pub mod benchmark;

/// Command-line interface
pub mod cli;

pub mod logging;

/// Measurement collection and latency statistics
pub mod metrics;

/// Run results, report rendering and JSON output
pub mod results;

/// Transport abstraction and the bundled WebSocket and TCP transports
pub mod transport;

pub mod utils;

/// Per-client worker state machine
pub mod worker;

pub use benchmark::{BenchmarkConfig, BenchmarkRunner};
pub use metrics::{calculate_stats, LatencyStats, MeasurementCollector};
pub use results::{ResultsManager, RunResult};
pub use transport::{Connection, Transport, TransportError, TransportFactory};

use anyhow::Context;

/// The current version of wsbench
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Benchmark name shown in the report
    pub const NAME: &str = "WebSocket Benchmark";

    /// Server the benchmark targets when no URL is given
    pub const SERVER_URL: &str = "ws://localhost:8080/ws";

    /// Default number of concurrent clients
    pub const CLIENTS: usize = 100;

    /// Default number of messages per client
    pub const MESSAGES: usize = 1000;

    /// Filler bytes appended to every request
    ///
    /// Content is irrelevant; only its size matters for byte accounting.
    pub const PAYLOAD_SIZE: usize = 1024;

    /// Lower bound of the per-client start-up jitter
    pub const JITTER_MIN: Duration = Duration::from_millis(5);

    /// Upper bound (exclusive) of the per-client start-up jitter
    ///
    /// Spreading connects over this window avoids every client hitting the
    /// server in the same instant.
    pub const JITTER_MAX: Duration = Duration::from_millis(20);
}

/// Run one benchmark against the transport implied by the server address.
///
/// Fails only on configuration problems (invalid parameters or an
/// unsupported address scheme). Connection and message failures are
/// reported through the returned [`RunResult`].
pub async fn run_benchmark(config: BenchmarkConfig) -> anyhow::Result<RunResult> {
    let transport = TransportFactory::for_address(&config.server_address)
        .with_context(|| format!("Cannot benchmark {}", config.server_address))?;
    let runner = BenchmarkRunner::new(config, transport)?;
    Ok(runner.run().await)
}
