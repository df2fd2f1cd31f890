//! # Measurement Collection and Latency Statistics
//!
//! Two pieces live here:
//!
//! - [`MeasurementCollector`]: the shared, write-many accumulator that every
//!   client worker pushes its connection latencies, round-trip latencies and
//!   byte counts into while a run is in progress.
//! - [`calculate_stats`]: the pure function that turns a frozen set of
//!   durations into a [`LatencyStats`] summary once the run is over.
//!
//! Percentiles use nearest-rank selection (`floor(count * p / 100)`, clamped
//! to the last element) rather than interpolation, so results are exact and
//! reproducible for any input.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Percentiles reported for every latency stream.
pub const PERCENTILES: [u32; 4] = [50, 90, 95, 99];

/// Summary statistics for one latency stream
///
/// Computed once from a frozen measurement set and never mutated afterwards.
/// The `Default` value (every field zero) is what an empty stream produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub total: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyStats {
    /// Look up one of the reported percentiles by rank.
    pub fn percentile(&self, p: u32) -> Option<Duration> {
        match p {
            50 => Some(self.p50),
            90 => Some(self.p90),
            95 => Some(self.p95),
            99 => Some(self.p99),
            _ => None,
        }
    }
}

/// Compute summary statistics over a set of latencies.
///
/// The slice is sorted in place. An empty slice yields
/// `LatencyStats::default()`; no division happens in that case.
///
/// ## Percentile selection
///
/// For percentile `p`, the selected element is at index
/// `floor(count * p / 100)`, clamped to `count - 1`. With two samples every
/// reported percentile (including p50) lands on index 1, the maximum.
pub fn calculate_stats(latencies: &mut [Duration]) -> LatencyStats {
    if latencies.is_empty() {
        return LatencyStats::default();
    }

    latencies.sort_unstable();

    let count = latencies.len();
    let total: Duration = latencies.iter().sum();
    let average = Duration::from_nanos((total.as_nanos() / count as u128) as u64);

    LatencyStats {
        count,
        total,
        average,
        min: latencies[0],
        max: latencies[count - 1],
        p50: nearest_rank(latencies, 50),
        p90: nearest_rank(latencies, 90),
        p95: nearest_rank(latencies, 95),
        p99: nearest_rank(latencies, 99),
    }
}

/// Select the nearest-rank element for percentile `p` from a sorted,
/// non-empty slice.
fn nearest_rank(sorted: &[Duration], p: u32) -> Duration {
    let index = sorted.len() * p as usize / 100;
    sorted[index.min(sorted.len() - 1)]
}

/// Round-trip stream plus the byte counters that move with it.
///
/// Kept behind one lock so a latency sample and its byte counts are always
/// observed together.
#[derive(Debug, Default)]
struct MessageStream {
    latencies: Vec<Duration>,
    bytes_sent: u64,
    bytes_received: u64,
}

/// Everything a run collected, taken out of the collector after the join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurements {
    pub connection_latencies: Vec<Duration>,
    pub message_latencies: Vec<Duration>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl Measurements {
    /// Compute stats for both latency streams.
    ///
    /// Returns `(connection, round_trip)`.
    pub fn stats(&mut self) -> (LatencyStats, LatencyStats) {
        (
            calculate_stats(&mut self.connection_latencies),
            calculate_stats(&mut self.message_latencies),
        )
    }
}

/// Thread-safe accumulator shared by all client workers of a run
///
/// Connection and round-trip measurements use independent locks; workers
/// recording a connection never contend with workers recording messages.
/// The collector is append-only. Reading happens once, through
/// [`MeasurementCollector::freeze`], after every writer has been joined.
#[derive(Debug, Default)]
pub struct MeasurementCollector {
    connections: Mutex<Vec<Duration>>,
    messages: Mutex<MessageStream>,
}

impl MeasurementCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector with room for the expected sample counts
    pub fn with_capacity(clients: usize, messages: usize) -> Self {
        Self {
            connections: Mutex::new(Vec::with_capacity(clients)),
            messages: Mutex::new(MessageStream {
                latencies: Vec::with_capacity(messages),
                ..Default::default()
            }),
        }
    }

    /// Record one successful connection establishment.
    pub fn record_connection(&self, latency: Duration) {
        self.connections.lock().push(latency);
    }

    /// Record one completed round trip together with its byte counts.
    pub fn record_message(&self, latency: Duration, bytes_sent: usize, bytes_received: usize) {
        let mut stream = self.messages.lock();
        stream.latencies.push(latency);
        stream.bytes_sent += bytes_sent as u64;
        stream.bytes_received += bytes_received as u64;
    }

    /// Number of connection samples recorded so far
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Number of round-trip samples recorded so far
    pub fn message_count(&self) -> usize {
        self.messages.lock().latencies.len()
    }

    /// Take the collected data out of the collector.
    ///
    /// Callers must only freeze once no worker can still record; anything
    /// recorded afterwards lands in a fresh, empty set.
    pub fn freeze(&self) -> Measurements {
        let connection_latencies = std::mem::take(&mut *self.connections.lock());
        let stream = std::mem::take(&mut *self.messages.lock());

        Measurements {
            connection_latencies,
            message_latencies: stream.latencies,
            bytes_sent: stream.bytes_sent,
            bytes_received: stream.bytes_received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&v| Duration::from_millis(v)).collect()
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let stats = calculate_stats(&mut []);
        assert_eq!(stats, LatencyStats::default());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, Duration::ZERO);
        assert_eq!(stats.p99, Duration::ZERO);
    }

    #[test]
    fn test_single_sample() {
        let stats = calculate_stats(&mut ms(&[7]));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total, Duration::from_millis(7));
        assert_eq!(stats.average, Duration::from_millis(7));
        for p in PERCENTILES {
            assert_eq!(stats.percentile(p), Some(Duration::from_millis(7)));
        }
    }

    #[test]
    fn test_two_samples_select_upper_element() {
        let stats = calculate_stats(&mut ms(&[20, 10]));
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(20));
        assert_eq!(stats.p50, Duration::from_millis(20));
        assert_eq!(stats.p90, Duration::from_millis(20));
        assert_eq!(stats.p95, Duration::from_millis(20));
        assert_eq!(stats.p99, Duration::from_millis(20));
        assert_eq!(stats.average, Duration::from_millis(15));
    }

    #[test]
    fn test_hundred_samples_nearest_rank() {
        // 1..=100 ms, shuffled order should not matter
        let mut values: Vec<Duration> = (1..=100).rev().map(Duration::from_millis).collect();
        let stats = calculate_stats(&mut values);
        assert_eq!(stats.p50, Duration::from_millis(51));
        assert_eq!(stats.p90, Duration::from_millis(91));
        assert_eq!(stats.p95, Duration::from_millis(96));
        assert_eq!(stats.p99, Duration::from_millis(100));
        assert_eq!(stats.total, Duration::from_millis(5050));
    }

    #[test]
    fn test_average_truncates_remainder() {
        let mut values = vec![
            Duration::from_nanos(1),
            Duration::from_nanos(1),
            Duration::from_nanos(2),
        ];
        let stats = calculate_stats(&mut values);
        assert_eq!(stats.total, Duration::from_nanos(4));
        assert_eq!(stats.average, Duration::from_nanos(1));
    }

    #[test]
    fn test_stats_ordering_holds() {
        let samples: [&[u64]; 5] = [
            &[5],
            &[3, 1, 2],
            &[9, 9, 9, 9],
            &[100, 1, 50, 25, 75, 60, 2],
            &[40, 10, 30, 20, 80, 70, 60, 50, 90, 100, 110],
        ];
        for sample in samples {
            let stats = calculate_stats(&mut ms(sample));
            assert!(stats.max >= stats.p99, "{:?}", sample);
            assert!(stats.p99 >= stats.p95, "{:?}", sample);
            assert!(stats.p95 >= stats.p90, "{:?}", sample);
            assert!(stats.p90 >= stats.p50, "{:?}", sample);
            assert!(stats.p50 >= stats.min, "{:?}", sample);
            assert!(stats.average >= stats.min && stats.average <= stats.max);
        }
    }

    #[test]
    fn test_unknown_percentile_lookup() {
        let stats = calculate_stats(&mut ms(&[1, 2, 3]));
        assert_eq!(stats.percentile(75), None);
    }

    #[test]
    fn test_record_message_updates_counters_together() {
        let collector = MeasurementCollector::new();
        collector.record_message(Duration::from_millis(2), 100, 90);
        collector.record_message(Duration::from_millis(4), 100, 110);
        collector.record_connection(Duration::from_millis(1));

        assert_eq!(collector.message_count(), 2);
        assert_eq!(collector.connection_count(), 1);

        let measurements = collector.freeze();
        assert_eq!(measurements.bytes_sent, 200);
        assert_eq!(measurements.bytes_received, 200);
        assert_eq!(measurements.message_latencies.len(), 2);
        assert_eq!(measurements.connection_latencies, ms(&[1]));
    }

    #[test]
    fn test_freeze_empties_collector() {
        let collector = MeasurementCollector::with_capacity(4, 16);
        collector.record_connection(Duration::from_millis(3));
        let _ = collector.freeze();

        let second = collector.freeze();
        assert_eq!(second, Measurements::default());
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 500;

        let collector = Arc::new(MeasurementCollector::new());
        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        collector.record_message(Duration::from_micros((w * i) as u64), 10, 20);
                        if i == 0 {
                            collector.record_connection(Duration::from_micros(w as u64));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut measurements = collector.freeze();
        assert_eq!(measurements.message_latencies.len(), WRITERS * PER_WRITER);
        assert_eq!(measurements.connection_latencies.len(), WRITERS);
        assert_eq!(measurements.bytes_sent, (WRITERS * PER_WRITER * 10) as u64);
        assert_eq!(measurements.bytes_received, (WRITERS * PER_WRITER * 20) as u64);

        let (connection, round_trip) = measurements.stats();
        assert_eq!(connection.count, WRITERS);
        assert_eq!(round_trip.count, WRITERS * PER_WRITER);
    }
}
