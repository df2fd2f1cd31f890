use crate::{
    benchmark::BenchmarkConfig,
    metrics::LatencyStats,
    utils::{format_duration, format_rate, format_size, rate},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Complete result of one benchmark run
///
/// Immutable once assembled by the runner. Rate helpers return `0.0` when
/// their denominator is zero (no clients, no messages, or no elapsed time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,
    pub server_address: String,
    pub num_clients: usize,
    pub num_messages: usize,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Wall-clock span of the whole run, jitter and connects included
    pub duration: Duration,
    pub connection_stats: LatencyStats,
    pub message_stats: LatencyStats,
    /// Clients that managed to open their connection
    pub connected_clients: usize,
    pub successes: usize,
    pub failures: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RunResult {
    /// Assemble a result from frozen measurements.
    ///
    /// `successes` is the number of recorded round trips; every other
    /// expected message counts as a failure.
    pub fn new(
        config: &BenchmarkConfig,
        duration: Duration,
        bytes_sent: u64,
        bytes_received: u64,
        connection_stats: LatencyStats,
        message_stats: LatencyStats,
    ) -> Self {
        let expected = config.expected_messages();
        let successes = message_stats.count;

        Self {
            name: config.name.clone(),
            server_address: config.server_address.clone(),
            num_clients: config.num_clients,
            num_messages: config.num_messages,
            bytes_sent,
            bytes_received,
            duration,
            connection_stats,
            message_stats,
            connected_clients: connection_stats.count,
            successes,
            failures: expected.saturating_sub(successes),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Messages the run was asked to perform
    pub fn expected_messages(&self) -> usize {
        self.num_clients.saturating_mul(self.num_messages)
    }

    /// Successful round trips as a percentage of expected messages
    pub fn success_rate(&self) -> f64 {
        rate(self.successes as f64, self.expected_messages() as f64) * 100.0
    }

    /// Failed round trips as a percentage of expected messages
    pub fn failure_rate(&self) -> f64 {
        rate(self.failures as f64, self.expected_messages() as f64) * 100.0
    }

    /// Round trips per second of per-client messaging time
    ///
    /// Divides successes by the summed round-trip latency averaged over the
    /// clients, which excludes jitter and connection setup.
    pub fn throughput(&self) -> f64 {
        let per_client_secs = rate(
            self.message_stats.total.as_secs_f64(),
            self.num_clients as f64,
        );
        rate(self.successes as f64, per_client_secs)
    }

    /// Round trips per second of wall-clock run time
    pub fn throughput_with_connecting(&self) -> f64 {
        rate(self.successes as f64, self.duration.as_secs_f64())
    }

    pub fn bytes_sent_per_second(&self) -> f64 {
        rate(self.bytes_sent as f64, self.duration.as_secs_f64())
    }

    pub fn bytes_received_per_second(&self) -> f64 {
        rate(self.bytes_received as f64, self.duration.as_secs_f64())
    }
}

/// Writes one labelled report line, padding the label with dots.
fn report_line(f: &mut fmt::Formatter<'_>, label: &str, value: fmt::Arguments<'_>) -> fmt::Result {
    writeln!(f, "{:.<37}: {}", label, value)
}

fn latency_summary(stats: &LatencyStats) -> String {
    format!(
        "sum={} avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={}",
        format_duration(stats.total),
        format_duration(stats.average),
        format_duration(stats.min),
        format_duration(stats.p50),
        format_duration(stats.max),
        format_duration(stats.p90),
        format_duration(stats.p95),
        format_duration(stats.p99),
    )
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark: {}", self.name)?;
        report_line(f, "clients", format_args!("{}", self.num_clients))?;
        report_line(f, "messages_per_client", format_args!("{}", self.num_messages))?;
        report_line(
            f,
            "data_sent",
            format_args!(
                "{} {}",
                format_size(self.bytes_sent as f64, 1024.0),
                format_rate(self.bytes_sent_per_second())
            ),
        )?;
        report_line(
            f,
            "data_received",
            format_args!(
                "{} {}",
                format_size(self.bytes_received as f64, 1024.0),
                format_rate(self.bytes_received_per_second())
            ),
        )?;
        report_line(
            f,
            "successes",
            format_args!(
                "{:.2}% ✓{} ✗{}",
                self.success_rate(),
                self.successes,
                self.failures
            ),
        )?;
        report_line(
            f,
            "fails",
            format_args!(
                "{:.2}% ✓{} ✗{}",
                self.failure_rate(),
                self.failures,
                self.successes
            ),
        )?;
        report_line(
            f,
            "latency_connecting",
            format_args!("{}", latency_summary(&self.connection_stats)),
        )?;
        report_line(
            f,
            "latency",
            format_args!("{}", latency_summary(&self.message_stats)),
        )?;
        report_line(f, "throughput", format_args!("{:.2}/s", self.throughput()))?;
        report_line(
            f,
            "throughput_with_connecting",
            format_args!("{:.2}/s", self.throughput_with_connecting()),
        )?;
        write!(
            f,
            "{:.<37}: {}",
            "duration_benchmark",
            format_duration(self.duration)
        )
    }
}

/// Results manager for writing run results to disk
pub struct ResultsManager {
    output_file: Option<PathBuf>,
}

impl ResultsManager {
    /// Create a results manager; `None` disables file output
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
        }
    }

    /// Output file, if one is configured
    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Write `result` as pretty-printed JSON to the output file.
    pub fn write(&self, result: &RunResult) -> Result<()> {
        let Some(path) = self.output_file.as_ref() else {
            debug!("No output file configured, skipping JSON output");
            return Ok(());
        };

        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, result)
            .context("Failed to serialize benchmark result")?;
        writeln!(writer)?;
        writer.flush()?;

        info!("Results written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::calculate_stats;

    fn sample_result(clients: usize, messages: usize, recorded: &[u64]) -> RunResult {
        let config = BenchmarkConfig::new("report", "ws://localhost:8080/ws", clients, messages);
        let mut latencies: Vec<Duration> = recorded.iter().map(|&ms| Duration::from_millis(ms)).collect();
        let mut connects = vec![Duration::from_millis(1); clients.min(1)];
        RunResult::new(
            &config,
            Duration::from_secs(2),
            2048,
            4096,
            calculate_stats(&mut connects),
            calculate_stats(&mut latencies),
        )
    }

    #[test]
    fn test_counts_and_rates() {
        let result = sample_result(2, 5, &[10, 20, 30, 40]);
        assert_eq!(result.successes, 4);
        assert_eq!(result.failures, 6);
        assert_eq!(result.successes + result.failures, result.expected_messages());
        assert_eq!(result.connected_clients, 1);
        assert!((result.success_rate() - 40.0).abs() < 1e-9);
        assert!((result.failure_rate() - 60.0).abs() < 1e-9);
        assert!((result.throughput_with_connecting() - 2.0).abs() < 1e-9);
        assert!((result.bytes_sent_per_second() - 1024.0).abs() < 1e-9);
        // 100ms of round trips over 2 clients -> 0.05s each
        assert!((result.throughput() - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_workload_rates_are_zero() {
        let config = BenchmarkConfig::new("empty", "ws://localhost", 0, 0);
        let result = RunResult::new(
            &config,
            Duration::ZERO,
            0,
            0,
            LatencyStats::default(),
            LatencyStats::default(),
        );
        assert_eq!(result.successes, 0);
        assert_eq!(result.failures, 0);
        for value in [
            result.success_rate(),
            result.failure_rate(),
            result.throughput(),
            result.throughput_with_connecting(),
            result.bytes_sent_per_second(),
            result.bytes_received_per_second(),
        ] {
            assert_eq!(value, 0.0);
        }
        // Rendering must not panic either
        assert!(result.to_string().contains("0.00% ✓0 ✗0"));
    }

    #[test]
    fn test_report_layout() {
        let report = sample_result(1, 4, &[10, 20, 30, 40]).to_string();
        assert!(report.starts_with("Benchmark: report\n"));
        assert!(report.contains("clients..............................: 1\n"));
        assert!(report.contains("messages_per_client..................: 4\n"));
        assert!(report.contains("data_sent............................: 2 kB 1 kB/s\n"));
        assert!(report.contains("successes............................: 100.00% ✓4 ✗0\n"));
        assert!(report.contains("med=30.00ms"));
        assert!(report.ends_with("duration_benchmark...................: 2.00s"));
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let result = sample_result(3, 2, &[5, 6, 7]);

        let manager = ResultsManager::new(Some(&path));
        assert_eq!(manager.output_file(), Some(path.as_path()));
        manager.write(&result).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["successes"], 3);
        assert_eq!(value["failures"], 3);
        assert_eq!(value["num_clients"], 3);
        assert_eq!(value["message_stats"]["count"], 3);

        let parsed: RunResult = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_write_without_output_file_is_noop() {
        let manager = ResultsManager::new(None);
        assert!(manager.output_file().is_none());
        assert!(manager.write(&sample_result(1, 1, &[1])).is_ok());
    }
}
