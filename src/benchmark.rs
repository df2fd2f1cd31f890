//! # Benchmark Engine Module
//!
//! The [`BenchmarkRunner`] fans a run out into one [`ClientWorker`] per
//! simulated client, waits for every one of them, and turns what they
//! recorded into a [`RunResult`].
//!
//! ## Run lifecycle
//!
//! 1. **Setup**: create an empty [`MeasurementCollector`] shared by all workers
//! 2. **Fan-out**: spawn `num_clients` workers onto a `JoinSet`
//! 3. **Join**: wait for every worker, including those that failed early
//! 4. **Freeze**: take the measurements out of the collector
//! 5. **Summarize**: compute latency statistics and success/failure counts
//!
//! The wall-clock duration spans from just before the first spawn to just
//! after the last join, so it covers jitter and connection setup as well.
//!
//! ## Failure handling
//!
//! Worker failures never abort the run. A worker that cannot connect
//! contributes nothing; one that fails mid-run keeps the round trips it
//! completed. Every expected message that was not completed is a failure.

use crate::{
    cli::Args,
    defaults,
    metrics::MeasurementCollector,
    results::RunResult,
    transport::Transport,
    utils::{self, format_duration},
    worker::{ClientWorker, WorkerExit, WorkerOutcome},
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on sample slots reserved up front
const MAX_PREALLOCATED_SAMPLES: usize = 1 << 20;

/// A helper struct to provide a consistent, single source of truth for displaying
/// the benchmark configuration at the start of a run.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
    transport: &'a str,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Benchmark: {}", self.config.name)?;
        writeln!(f, "  Server:             {}", self.config.server_address)?;
        writeln!(f, "  Transport:          {}", self.transport)?;
        writeln!(f, "  Clients:            {}", self.config.num_clients)?;
        writeln!(f, "  Messages/Client:    {}", self.config.num_messages)?;
        writeln!(
            f,
            "  Payload Filler:     {} bytes",
            self.config.payload_size
        )?;
        writeln!(
            f,
            "  Start-up Jitter:    {} - {}",
            format_duration(self.config.jitter_min),
            format_duration(self.config.jitter_max)
        )?;
        let timeout_str = self
            .config
            .op_timeout
            .map_or("None".to_string(), format_duration);
        writeln!(f, "  Operation Timeout:  {}", timeout_str)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Configuration for one benchmark run
///
/// Everything a run needs is carried here explicitly; there is no
/// process-wide state.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkConfig {
    /// Human-readable benchmark name, echoed in the report
    pub name: String,

    /// Address of the service under test (e.g. `ws://localhost:8080/ws`)
    pub server_address: String,

    /// Number of concurrent clients
    pub num_clients: usize,

    /// Number of sequential round trips each client performs
    pub num_messages: usize,

    /// Number of filler bytes appended to every request
    pub payload_size: usize,

    /// Lower bound of the random start-up delay
    pub jitter_min: Duration,

    /// Upper bound (exclusive) of the random start-up delay
    pub jitter_max: Duration,

    /// Optional deadline applied to each connect, send, and receive
    ///
    /// `None` reproduces the unbounded behavior: a hung operation blocks its
    /// worker for as long as the peer keeps it hanging.
    pub op_timeout: Option<Duration>,
}

impl BenchmarkConfig {
    /// Create a configuration with default payload size, jitter, and no timeout
    pub fn new(
        name: impl Into<String>,
        server_address: impl Into<String>,
        num_clients: usize,
        num_messages: usize,
    ) -> Self {
        Self {
            name: name.into(),
            server_address: server_address.into(),
            num_clients,
            num_messages,
            payload_size: defaults::PAYLOAD_SIZE,
            jitter_min: defaults::JITTER_MIN,
            jitter_max: defaults::JITTER_MAX,
            op_timeout: None,
        }
    }

    /// Create benchmark configuration from CLI arguments
    ///
    /// ## Returns
    /// - `Ok(BenchmarkConfig)`: validated configuration ready for use
    /// - `Err(anyhow::Error)`: a parameter failed validation
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Self {
            name: args.name.clone(),
            server_address: args.url.clone(),
            num_clients: args.clients,
            num_messages: args.messages,
            payload_size: args.payload_size,
            jitter_min: args.jitter_min,
            jitter_max: args.jitter_max,
            op_timeout: args.timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values a run cannot honor
    pub fn validate(&self) -> Result<()> {
        utils::validate_workload(self.num_clients, self.num_messages)?;
        utils::validate_payload_size(self.payload_size)?;
        utils::validate_jitter(self.jitter_min, self.jitter_max)?;
        utils::validate_timeout(self.op_timeout)?;
        Ok(())
    }

    /// Total number of round trips the run is expected to perform
    pub fn expected_messages(&self) -> usize {
        self.num_clients.saturating_mul(self.num_messages)
    }
}

/// Runs one benchmark against a transport
///
/// A runner executes exactly one run; [`BenchmarkRunner::run`] consumes it.
///
/// ```rust,no_run
/// # use wsbench::benchmark::{BenchmarkConfig, BenchmarkRunner};
/// # use wsbench::transport::TransportFactory;
/// #
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let config = BenchmarkConfig::new("smoke", "ws://localhost:8080/ws", 10, 100);
/// let transport = TransportFactory::for_address(&config.server_address)?;
/// let result = BenchmarkRunner::new(config, transport)?.run().await;
/// println!("{}", result);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    config: Arc<BenchmarkConfig>,
    transport: Arc<dyn Transport>,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: BenchmarkConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Configuration this runner was built with
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Execute the run and summarize it.
    pub async fn run(self) -> RunResult {
        info!(
            "{}",
            BenchmarkConfigDisplay {
                config: &self.config,
                transport: self.transport.name(),
            }
        );

        let expected = self.config.expected_messages();
        let collector = Arc::new(MeasurementCollector::with_capacity(
            self.config.num_clients.min(MAX_PREALLOCATED_SAMPLES),
            expected.min(MAX_PREALLOCATED_SAMPLES),
        ));
        let filler: Arc<str> = Arc::from("a".repeat(self.config.payload_size));

        let started = Instant::now();

        let mut workers = JoinSet::new();
        for client_id in 0..self.config.num_clients {
            let worker = ClientWorker::new(
                client_id,
                Arc::clone(&self.config),
                Arc::clone(&self.transport),
                Arc::clone(&collector),
                Arc::clone(&filler),
            );
            workers.spawn(worker.run());
        }

        let outcomes = Self::join_all(&mut workers).await;
        let duration = started.elapsed();

        let mut measurements = collector.freeze();
        let (connection_stats, message_stats) = measurements.stats();

        let reported: usize = outcomes.iter().map(|o| o.messages_completed).sum();
        if reported != message_stats.count {
            // Only possible when a worker task panicked after recording.
            warn!(
                "Workers reported {} completed round trips but {} were recorded",
                reported, message_stats.count
            );
        }
        Self::log_outcomes(&outcomes);

        let result = RunResult::new(
            &self.config,
            duration,
            measurements.bytes_sent,
            measurements.bytes_received,
            connection_stats,
            message_stats,
        );

        info!(
            "Benchmark '{}' finished in {}: {} succeeded, {} failed",
            self.config.name,
            format_duration(duration),
            result.successes,
            result.failures
        );
        result
    }

    /// Wait for every spawned worker.
    ///
    /// A worker that panicked is still joined; it just has no outcome.
    async fn join_all(workers: &mut JoinSet<WorkerOutcome>) -> Vec<WorkerOutcome> {
        let mut outcomes = Vec::with_capacity(workers.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Client worker did not finish cleanly: {}", e),
            }
        }
        outcomes
    }

    fn log_outcomes(outcomes: &[WorkerOutcome]) {
        let mut connect_failures = 0;
        let mut aborted = 0;
        for outcome in outcomes {
            match outcome.exit {
                WorkerExit::Completed => {}
                WorkerExit::ConnectFailed => connect_failures += 1,
                WorkerExit::SendFailed { .. } | WorkerExit::ReceiveFailed { .. } => aborted += 1,
            }
        }
        debug!(
            "{} workers joined: {} could not connect, {} stopped mid-run",
            outcomes.len(),
            connect_failures,
            aborted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportFactory;

    #[test]
    fn test_benchmark_config_defaults() {
        let config = BenchmarkConfig::new("bench", "ws://localhost:8080/ws", 100, 1000);

        assert_eq!(config.name, "bench");
        assert_eq!(config.payload_size, 1024);
        assert_eq!(config.jitter_min, Duration::from_millis(5));
        assert_eq!(config.jitter_max, Duration::from_millis(20));
        assert_eq!(config.op_timeout, None);
        assert_eq!(config.expected_messages(), 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_benchmark_config_rejects_inverted_jitter() {
        let config = BenchmarkConfig {
            jitter_min: Duration::from_millis(30),
            ..BenchmarkConfig::new("bench", "ws://localhost", 1, 1)
        };
        assert!(config.validate().is_err());
        assert!(BenchmarkRunner::new(config, TransportFactory::for_address("ws://x").unwrap()).is_err());
    }

    #[test]
    fn test_benchmark_config_rejects_overflow() {
        let config = BenchmarkConfig::new("bench", "ws://localhost", usize::MAX, 2);
        assert!(config.validate().is_err());
        assert_eq!(config.expected_messages(), usize::MAX);
    }

    #[test]
    fn test_config_display_lists_parameters() {
        let config = BenchmarkConfig {
            op_timeout: Some(Duration::from_secs(2)),
            ..BenchmarkConfig::new("display", "tcp://127.0.0.1:9000", 3, 4)
        };
        let rendered = BenchmarkConfigDisplay {
            config: &config,
            transport: "TCP",
        }
        .to_string();

        assert!(rendered.contains("Starting Benchmark: display"));
        assert!(rendered.contains("tcp://127.0.0.1:9000"));
        assert!(rendered.contains("Clients:            3"));
        assert!(rendered.contains("Messages/Client:    4"));
        assert!(rendered.contains("5.00ms - 20.00ms"));
        assert!(rendered.contains("Operation Timeout:  2.00s"));
    }
}
