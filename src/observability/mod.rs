//! Structured logging and log hygiene.
//!
//! - [`init_logging`] installs the `tracing` subscriber (stderr, `RUST_LOG`)
//! - [`redact_secrets`] scrubs credentials from text before it is logged
//! - [`preview`] shortens user text for log lines

use std::sync::OnceLock;

use regex::Regex;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `ticketrank=info` when `RUST_LOG` is not set. Output goes to
/// stderr so the stdio MCP transport keeps stdout to itself. Safe to call
/// more than once.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ticketrank=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

const REDACTED: &str = "***REDACTED***";

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw: &[(&str, &'static str)] = &[
            (
                r#"(?i)(api[_-]?key|apikey|x-api-key)['"]?\s*[:=]\s*['"]?([a-zA-Z0-9_\-]{20,})['"]?"#,
                "$1=***REDACTED***",
            ),
            (
                r#"(?i)(password|passwd|pwd)\s*[:=]\s*['"]?([^\s'"]{8,})['"]?"#,
                "$1=***REDACTED***",
            ),
            (
                r#"(?i)(secret|token)['"]?\s*[:=]\s*['"]?([a-zA-Z0-9_\-]{20,})['"]?"#,
                "$1=***REDACTED***",
            ),
            (r"(?i)Bearer\s+[a-zA-Z0-9_\-\.]{20,}", "Bearer ***REDACTED***"),
            (r"(?i)Basic\s+[a-zA-Z0-9+/=]{16,}", "Basic ***REDACTED***"),
            // Provider-style keys: sk-..., sk-ant-..., sk-proj-...
            (r"\bsk-[a-zA-Z0-9_\-]{20,}", REDACTED),
            // Credentials embedded in URLs.
            (r"(?i)(https?://)[^/\s:@]+:[^/\s@]+@", "$1***REDACTED***@"),
        ];
        raw.iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|re| (re, *replacement))
            })
            .collect()
    })
}

/// Redact potential secrets from text.
///
/// Replaces patterns that look like API keys, tokens, passwords, Bearer or
/// Basic credentials and `user:pass@` URL prefixes with `***REDACTED***`.
pub fn redact_secrets(text: &str) -> String {
    let mut result = text.to_string();
    for (re, replacement) in secret_patterns() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
