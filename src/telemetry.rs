//! Opt-in JSON trace log for diagnosing store and UI problems.
//!
//! Output goes to `$CYBERVAULT_TRACE_LOG` when set, otherwise to
//! `cybervault_trace.jsonl` beside the local slot. Every event carries the
//! enclosing `session` span, so one file can hold many runs against
//! different backends and still be split apart.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::Subscriber;
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::AppConfig;
use crate::store::StoreConfig;

const TRACE_LOG_ENV: &str = "CYBERVAULT_TRACE_LOG";
const TRACE_FILE: &str = "cybervault_trace.jsonl";

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Where trace output goes for `config`.
#[must_use]
pub fn tracing_log_path(config: &AppConfig) -> PathBuf {
    env::var_os(TRACE_LOG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_dir().join(TRACE_FILE))
}

fn open_trace_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn json_subscriber(file: File) -> impl Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_names(true)
        .finish()
}

fn init_tracing_once(config: &AppConfig, once: &OnceLock<Option<PathBuf>>) -> Option<PathBuf> {
    if !config.tracing_enabled() {
        return None;
    }
    once.get_or_init(|| {
        let path = tracing_log_path(config);
        let file = match open_trace_file(&path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("cybervault: trace log disabled ({}: {err})", path.display());
                return None;
            }
        };
        tracing::subscriber::set_global_default(json_subscriber(file))
            .ok()
            .map(|()| path)
    })
    .clone()
}

/// Install the JSON file subscriber once, if logging is enabled. Returns the
/// trace file path when a subscriber is active.
pub fn init_tracing(config: &AppConfig) -> Option<PathBuf> {
    init_tracing_once(config, &TRACING_INIT)
}

/// Span wrapping one run of the binary.
#[must_use]
pub fn session_span(store: &StoreConfig, headless: bool) -> tracing::Span {
    tracing::info_span!(
        "session",
        backend = %store.backend,
        data_dir = %store.data_dir.display(),
        mode = if headless { "list" } else { "ui" },
        pid = std::process::id(),
    )
}
