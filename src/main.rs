//! Telemetry sanitizer binary entry point.
//!
//! Reads capture requests as JSON lines on stdin and writes sanitized
//! events as JSON lines on stdout. All logs go to stderr.
//!
//! Coverage is excluded because the main function owns the process stdio
//! and exit code.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use telemetry_sanitizer::capture::{process_stream, EventCapture, StreamConfig};
use telemetry_sanitizer::config::Config;
use telemetry_sanitizer::error::AppError;
use telemetry_sanitizer::traits::RealTimeProvider;
use tokio::io::BufReader;

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // Initialize logging to stderr only (stdout is for event output)
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string())
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("telemetry-sanitizer starting...");

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing::info!(
        max_string_length = ?config.max_string_length,
        custom_patterns = config.custom_blocked_useragents.len(),
        opt_out_useragent_filter = config.opt_out_useragent_filter,
        "Configuration loaded"
    );

    let capture = EventCapture::new(config, RealTimeProvider);
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let stats = process_stream(&capture, stdin, stdout, &StreamConfig::default()).await?;
    let summary = capture.metrics().summary();
    tracing::info!(
        lines = stats.lines,
        captured = stats.captured,
        blocked = stats.blocked,
        malformed = stats.malformed,
        strings_truncated = summary.strings_truncated,
        cycles_broken = summary.cycles_broken,
        "telemetry-sanitizer shutdown complete"
    );
    Ok(())
}
