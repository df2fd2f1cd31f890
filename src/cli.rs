use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// wsbench - Concurrent request/response load generator for message-based services
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Name of the benchmark
    #[clap(long, default_value = crate::defaults::NAME, help_heading = "Core Options")]
    pub name: String,

    /// Server URL (ws://, wss:// or tcp://)
    #[clap(long, default_value = crate::defaults::SERVER_URL, help_heading = "Core Options")]
    pub url: String,

    /// Number of concurrent clients
    #[clap(short = 'c', long, default_value_t = crate::defaults::CLIENTS, help_heading = "Core Options")]
    pub clients: usize,

    /// Number of messages each client will send
    #[clap(short = 'm', long, default_value_t = crate::defaults::MESSAGES, help_heading = "Core Options")]
    pub messages: usize,

    /// Filler bytes appended to every message
    #[clap(short = 's', long, default_value_t = crate::defaults::PAYLOAD_SIZE)]
    pub payload_size: usize,

    /// Lower bound of the random start-up delay per client
    #[clap(long, value_parser = parse_duration, default_value = "5ms")]
    pub jitter_min: Duration,

    /// Upper bound of the random start-up delay per client
    #[clap(long, value_parser = parse_duration, default_value = "20ms")]
    pub jitter_max: Duration,

    /// Deadline for each connect, send and receive (unbounded if unset)
    #[clap(short = 't', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Write the result as JSON to this file
    #[clap(short = 'o', long, help_heading = "Output Options")]
    pub output_file: Option<PathBuf>,

    /// Also write logs to this file
    #[clap(long, help_heading = "Output Options")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, default_value_t = false, help_heading = "Output Options")]
    pub quiet: bool,
}

/// Parse duration from string (e.g., "250us", "500ms", "10s", "5m", "1h")
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ns") {
        (stripped, "ns")
    } else if let Some(stripped) = s.strip_suffix("us") {
        (stripped, "us")
    } else if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s")
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let nanos_per_unit = match unit {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(Duration::from_nanos((num * nanos_per_unit).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("1.5us").unwrap(), Duration::from_nanos(1500));
        assert_eq!(parse_duration("40ns").unwrap(), Duration::from_nanos(40));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["wsbench"]).unwrap();
        assert_eq!(args.name, "WebSocket Benchmark");
        assert_eq!(args.url, "ws://localhost:8080/ws");
        assert_eq!(args.clients, 100);
        assert_eq!(args.messages, 1000);
        assert_eq!(args.payload_size, 1024);
        assert_eq!(args.jitter_min, Duration::from_millis(5));
        assert_eq!(args.jitter_max, Duration::from_millis(20));
        assert_eq!(args.timeout, None);
        assert_eq!(args.output_file, None);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_explicit_args() {
        let args = Args::try_parse_from([
            "wsbench",
            "--name",
            "echo",
            "--url",
            "tcp://127.0.0.1:9000",
            "-c",
            "5",
            "-m",
            "10",
            "--timeout",
            "2s",
            "-o",
            "out.json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.name, "echo");
        assert_eq!(args.url, "tcp://127.0.0.1:9000");
        assert_eq!(args.clients, 5);
        assert_eq!(args.messages, 10);
        assert_eq!(args.timeout, Some(Duration::from_secs(2)));
        assert_eq!(args.output_file, Some(PathBuf::from("out.json")));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(Args::try_parse_from(["wsbench", "--jitter-max", "soon"]).is_err());
    }
}
