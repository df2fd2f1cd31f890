//! # Formatting and Validation Helpers
//!
//! Small helpers shared by the report printer and configuration loading:
//!
//! - **Formatting**: human-readable durations, byte sizes, and rates
//! - **Validation**: checks on workload parameters with clear error messages
//!
//! ```rust
//! use wsbench::utils::{format_duration, format_size};
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_size(2048.0, 1024.0), "2 kB");
//! ```

use anyhow::Result;
use std::time::Duration;

/// Unit suffixes used by [`format_size`], smallest first
const SIZE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Largest payload the workload accepts, matching the TCP frame limit
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Format a duration in a human-readable way
///
/// Picks the unit from the magnitude:
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: longer spans (e.g., "5m 30s", "2h 15m 30s")
///
/// ```rust
/// # use wsbench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a size by repeatedly dividing by `base`
///
/// Bytes and the first scaled unit are shown as whole numbers; anything
/// from the second scaled unit up gets two decimal places.
///
/// ```rust
/// # use wsbench::utils::format_size;
/// assert_eq!(format_size(512.0, 1024.0), "512 B");
/// assert_eq!(format_size(1536.0, 1024.0), "2 kB");
/// assert_eq!(format_size(1572864.0, 1024.0), "1.50 MB");
/// ```
pub fn format_size(size: f64, base: f64) -> String {
    let mut size = if size.is_finite() { size.max(0.0) } else { 0.0 };
    let mut unit = 0;
    while size >= base && unit < SIZE_UNITS.len() - 1 {
        size /= base;
        unit += 1;
    }

    if unit > 1 {
        format!("{:.2} {}", size, SIZE_UNITS[unit])
    } else {
        format!("{:.0} {}", size, SIZE_UNITS[unit])
    }
}

/// Format a byte count using binary (1024) scaling
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes as f64, 1024.0)
}

/// Format a byte rate with a "/s" suffix
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_size(bytes_per_second, 1024.0))
}

/// Divide, returning 0.0 when the denominator is zero or not finite.
pub fn rate(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        numerator / denominator
    } else {
        0.0
    }
}

/// Validate the per-message filler size
pub fn validate_payload_size(payload_size: usize) -> Result<()> {
    if payload_size > MAX_PAYLOAD_SIZE {
        anyhow::bail!(
            "Payload size {} is too large (maximum {} bytes)",
            payload_size,
            MAX_PAYLOAD_SIZE
        );
    }
    Ok(())
}

/// Validate the start-up jitter bounds
pub fn validate_jitter(min: Duration, max: Duration) -> Result<()> {
    if min > max {
        anyhow::bail!(
            "Jitter minimum {} is larger than jitter maximum {}",
            format_duration(min),
            format_duration(max)
        );
    }
    Ok(())
}

/// Validate that the total number of expected messages is representable
pub fn validate_workload(num_clients: usize, num_messages: usize) -> Result<usize> {
    num_clients.checked_mul(num_messages).ok_or_else(|| {
        anyhow::anyhow!(
            "{} clients x {} messages overflows the message counter",
            num_clients,
            num_messages
        )
    })
}

/// Validate an optional per-operation timeout
pub fn validate_timeout(timeout: Option<Duration>) -> Result<()> {
    if timeout == Some(Duration::ZERO) {
        anyhow::bail!("Operation timeout must be greater than zero");
    }
    Ok(())
}
