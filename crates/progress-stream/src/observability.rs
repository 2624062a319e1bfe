use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENV_ENABLED: &str = "PROGRESS_STREAM_OBSERVABILITY";
const ENV_LOG_LEVEL: &str = "PROGRESS_STREAM_LOG_LEVEL";
const ENV_JSON_LOG_PATH: &str = "PROGRESS_STREAM_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "progress-stream.logs.jsonl";

/// Where log records go.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LogTarget {
    Disabled,
    /// Human-readable lines on stderr, keeping stdout free for results.
    Console,
    /// JSON lines appended to a file.
    JsonFile { dir: PathBuf, file_name: String },
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn resolve_target(lookup: impl Fn(&str) -> Option<String>) -> LogTarget {
    let enabled = lookup(ENV_ENABLED)
        .map(|v| parse_bool_env(&v).unwrap_or(true))
        .unwrap_or(true);
    if !enabled {
        return LogTarget::Disabled;
    }
    let Some(raw) = lookup(ENV_JSON_LOG_PATH).filter(|p| !p.trim().is_empty()) else {
        return LogTarget::Console;
    };
    let path = PathBuf::from(raw.trim());
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    LogTarget::JsonFile { dir, file_name }
}

fn resolve_env_filter() -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL)
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Installs the global tracing subscriber once per process.
///
/// Environment variables:
/// - `PROGRESS_STREAM_OBSERVABILITY`: enable/disable flag (default enabled).
/// - `PROGRESS_STREAM_LOG_LEVEL`: level or filter directive; falls back to `RUST_LOG`, then `info`.
/// - `PROGRESS_STREAM_JSON_LOG_PATH`: when set, logs are JSONL in that file instead of stderr.
pub fn init_observability() {
    INIT.get_or_init(|| match resolve_target(|key| std::env::var(key).ok()) {
        LogTarget::Disabled => {}
        LogTarget::JsonFile { dir, file_name } => {
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(resolve_env_filter())
                .with(json_layer)
                .try_init();
        }
        LogTarget::Console => {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(resolve_env_filter())
                .with(console_layer)
                .try_init();
        }
    });
}
