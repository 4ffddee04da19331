//! JSON lines stream processing.
//!
//! Reads one [`CaptureRequest`] per line, passes it through an
//! [`EventCapture`] and writes each captured event as one JSON line.
//! Blocked events produce no output. Malformed lines, including lines that
//! are not valid UTF-8 or exceed the size cap, are logged and skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{CaptureOutcome, CaptureRequest, EventCapture};
use crate::error::AppError;
use crate::traits::TimeProvider;

/// Options for stream processing.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Lines longer than this many bytes are rejected as malformed.
    ///
    /// At most this many bytes of a line are buffered; the remainder of an
    /// oversized line is discarded as it is read.
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Line counts from one stream run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Non-blank lines read.
    pub lines: u64,
    /// Events written to the output.
    pub captured: u64,
    /// Events dropped by the bot filter.
    pub blocked: u64,
    /// Lines that could not be parsed.
    pub malformed: u64,
}

/// Read one `\n`-terminated line into `buf`, keeping at most `max` bytes.
///
/// Returns the full length of the line without its terminator, or `None`
/// at end of input. A result larger than `max` means `buf` holds only a
/// prefix.
async fn read_line_bounded<R>(
    reader: &mut R,
    max: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut total = 0usize;
    let mut read_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(read_any.then_some(total));
        }
        read_any = true;

        let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..end], end + 1, true),
            None => (available, available.len(), false),
        };
        let room = max.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        total = total.saturating_add(chunk.len());
        reader.consume(used);

        if done {
            return Ok(Some(total));
        }
    }
}

/// Process JSON lines from `reader` until end of input.
///
/// # Errors
///
/// Returns [`AppError::Io`] if reading or writing fails, and
/// [`AppError::Json`] if a captured event cannot be encoded.
pub async fn process_stream<T, R, W>(
    capture: &EventCapture<T>,
    mut reader: R,
    mut writer: W,
    config: &StreamConfig,
) -> Result<StreamStats, AppError>
where
    T: TimeProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = StreamStats::default();
    let mut buf = Vec::new();

    while let Some(bytes) = read_line_bounded(&mut reader, config.max_line_bytes, &mut buf).await?
    {
        if bytes > config.max_line_bytes {
            stats.lines += 1;
            stats.malformed += 1;
            tracing::warn!(
                line = stats.lines,
                bytes,
                max = config.max_line_bytes,
                "Skipping oversized line"
            );
            continue;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim(),
            Err(e) => {
                stats.lines += 1;
                stats.malformed += 1;
                tracing::warn!(line = stats.lines, error = %e, "Skipping non UTF-8 line");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;

        let request: CaptureRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(line = stats.lines, error = %e, "Skipping malformed line");
                continue;
            }
        };

        match capture.capture(request) {
            CaptureOutcome::Captured(event) => {
                let mut encoded = serde_json::to_vec(&event)?;
                encoded.push(b'\n');
                writer.write_all(&encoded).await?;
                stats.captured += 1;
            }
            CaptureOutcome::Blocked { .. } => stats.blocked += 1,
        }
    }

    writer.flush().await?;
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_utils::{mock_time_str, GOOGLEBOT_UA};
    use pretty_assertions::assert_eq;

    fn gate(config: Config) -> EventCapture<crate::traits::MockTimeProvider> {
        EventCapture::new(config, mock_time_str("2024-03-01T12:00:00Z"))
    }

    async fn run(config: Config, input: &str) -> (StreamStats, Vec<serde_json::Value>) {
        run_bytes(config, input.as_bytes(), &StreamConfig::default()).await
    }

    async fn run_bytes(
        config: Config,
        input: &[u8],
        stream_config: &StreamConfig,
    ) -> (StreamStats, Vec<serde_json::Value>) {
        let capture = gate(config);
        let mut output = Vec::new();
        let stats = process_stream(&capture, input, &mut output, stream_config)
            .await
            .unwrap();
        let events = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (stats, events)
    }

    #[tokio::test]
    async fn test_writes_captured_events() {
        let input = r#"{"event": "$pageview", "properties": {"path": "/home"}}
{"event": "click"}
"#;
        let (stats, events) = run(Config::default(), input).await;

        assert_eq!(
            stats,
            StreamStats {
                lines: 2,
                captured: 2,
                blocked: 0,
                malformed: 0,
            }
        );
        assert_eq!(events[0]["event"], "$pageview");
        assert_eq!(events[0]["properties"]["path"], "/home");
        assert_eq!(events[0]["timestamp"], "2024-03-01T12:00:00Z");
        assert_eq!(events[1]["event"], "click");
    }

    #[tokio::test]
    async fn test_skips_blocked_and_malformed_lines() {
        let input = format!(
            "{{\"event\": \"bot\", \"user_agent\": \"{GOOGLEBOT_UA}\"}}\nnot json\n\n{{\"event\": \"ok\"}}\n"
        );
        let (stats, events) = run(Config::default(), &input).await;

        assert_eq!(stats.lines, 3);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.captured, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "ok");
    }

    #[tokio::test]
    async fn test_truncates_properties() {
        let config = Config {
            max_string_length: Some(3),
            ..Config::default()
        };
        let (_, events) = run(config, r#"{"event": "e", "properties": {"s": "abcdef"}}"#).await;
        assert_eq!(events[0]["properties"]["s"], "abc");
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let capture = gate(Config::default());
        let mut output = Vec::new();
        let stats = process_stream(
            &capture,
            r#"{"event": "a-very-long-event-name"}"#.as_bytes(),
            &mut output,
            &StreamConfig { max_line_bytes: 8 },
        )
        .await
        .unwrap();

        assert_eq!(stats.malformed, 1);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input = b"{\"event\": \"first\"}\n".to_vec();
        input.extend_from_slice(b"{\"event\": \"\xff\xfe\"}\n");
        input.extend_from_slice(b"{\"event\": \"second\"}\n");

        let (stats, events) = run_bytes(Config::default(), &input, &StreamConfig::default()).await;

        assert_eq!(
            stats,
            StreamStats {
                lines: 3,
                captured: 2,
                blocked: 0,
                malformed: 1,
            }
        );
        assert_eq!(events[0]["event"], "first");
        assert_eq!(events[1]["event"], "second");
    }

    #[tokio::test]
    async fn test_stream_continues_after_oversized_line() {
        let input = format!("{{\"event\": \"{}\"}}\n{{\"event\": \"ok\"}}\r\n", "x".repeat(64));

        let (stats, events) = run_bytes(
            Config::default(),
            input.as_bytes(),
            &StreamConfig { max_line_bytes: 32 },
        )
        .await;

        assert_eq!(stats.lines, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.captured, 1);
        assert_eq!(events[0]["event"], "ok");
    }

    #[tokio::test]
    async fn test_bounded_read_keeps_only_prefix() {
        let mut reader = tokio::io::BufReader::with_capacity(4, &b"abcdefghij\nxy"[..]);
        let mut buf = Vec::new();

        let first = read_line_bounded(&mut reader, 3, &mut buf).await.unwrap();
        assert_eq!(first, Some(10));
        assert_eq!(buf, b"abc");

        let second = read_line_bounded(&mut reader, 3, &mut buf).await.unwrap();
        assert_eq!(second, Some(2));
        assert_eq!(buf, b"xy");

        assert_eq!(read_line_bounded(&mut reader, 3, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (stats, events) = run(Config::default(), "").await;
        assert_eq!(stats, StreamStats::default());
        assert!(events.is_empty());
    }
}
