//! Startup configuration: CLI flags, env fallbacks, and the persistent TOML file.
//!
//! Precedence is explicit flag (or its env var), then `config.toml`, then the
//! built-in default. Fields the user can set in the file are kept as `Option`
//! on [`AppConfig`] so the merge can tell "not given" apart from "given".

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use serde::Deserialize;
use thiserror::Error;

use crate::store::{StoreBackend, StoreConfig};

pub const CONFIG_FILE: &str = "config.toml";
pub const APP_DIR: &str = "cybervault";
pub const DEFAULT_REMOTE_TABLE: &str = "users";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
pub const MIN_REMOTE_TIMEOUT_MS: u64 = 1;
pub const MAX_REMOTE_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Parser, Clone, Default)]
#[command(
    name = "cybervault",
    about = "CyberVault profile directory",
    author,
    version
)]
pub struct AppConfig {
    /// Storage backend (local JSON slot or remote table API)
    #[arg(long = "backend", value_enum, env = "CYBERVAULT_BACKEND")]
    pub backend: Option<StoreBackend>,

    /// Directory holding the local slot file
    #[arg(long = "data-dir", env = "CYBERVAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the remote table service
    #[arg(long = "remote-url", env = "CYBERVAULT_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// API key sent with remote requests
    #[arg(
        long = "remote-key",
        env = "CYBERVAULT_REMOTE_KEY",
        hide_env_values = true
    )]
    pub remote_key: Option<String>,

    /// Remote table name (default: users)
    #[arg(long = "remote-table")]
    pub remote_table: Option<String>,

    /// Remote request timeout in milliseconds (default: 10000)
    #[arg(long = "remote-timeout-ms", value_parser = parse_remote_timeout_ms)]
    pub remote_timeout_ms: Option<u64>,

    /// Path to the persistent config file
    #[arg(long = "config", env = "CYBERVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSON trace logs to the trace file
    #[arg(long = "logs", action = ArgAction::SetTrue)]
    pub logs: bool,

    /// Disable trace logs even if the config file enables them
    #[arg(long = "no-logs", action = ArgAction::SetTrue)]
    pub no_logs: bool,

    /// Print the records and exit instead of starting the UI
    #[arg(long = "list", action = ArgAction::SetTrue)]
    pub list: bool,

    /// Filter applied to --list output
    #[arg(long = "search", requires = "list")]
    pub search: Option<String>,

    /// Print --list output as a JSON array
    #[arg(long = "json", requires = "list", action = ArgAction::SetTrue)]
    pub json: bool,
}

/// Keys accepted in `config.toml`. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub backend: Option<StoreBackend>,
    pub data_dir: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub remote_key: Option<String>,
    pub remote_table: Option<String>,
    pub remote_timeout_ms: Option<u64>,
    pub logs: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl FileConfig {
    /// Read `path`. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigFileError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let parsed: Self = toml::from_str(&contents).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(ms) = parsed.remote_timeout_ms {
            check_remote_timeout_ms(ms).map_err(|reason| ConfigFileError::Invalid {
                path: path.to_path_buf(),
                reason,
            })?;
        }
        Ok(parsed)
    }
}

impl AppConfig {
    /// Where the persistent config lives: `--config`, else the platform config dir.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Fill every field the command line left unset from `file`.
    pub fn apply_file(&mut self, file: FileConfig) {
        if self.backend.is_none() {
            self.backend = file.backend;
        }
        if self.data_dir.is_none() {
            self.data_dir = file.data_dir;
        }
        if self.remote_url.is_none() {
            self.remote_url = file.remote_url;
        }
        if self.remote_key.is_none() {
            self.remote_key = file.remote_key;
        }
        if self.remote_table.is_none() {
            self.remote_table = file.remote_table;
        }
        if self.remote_timeout_ms.is_none() {
            self.remote_timeout_ms = file.remote_timeout_ms;
        }
        if !self.logs {
            self.logs = file.logs.unwrap_or(false);
        }
    }

    /// Load the persistent file and merge it in. A broken file is reported to
    /// the caller and otherwise ignored.
    pub fn merge_persistent(&mut self) -> Result<(), ConfigFileError> {
        let Some(path) = self.config_path() else {
            return Ok(());
        };
        let file = FileConfig::load(&path)?;
        self.apply_file(file);
        Ok(())
    }

    #[must_use]
    pub fn backend(&self) -> StoreBackend {
        self.backend.unwrap_or_default()
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| env::temp_dir().join(APP_DIR))
    }

    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS))
    }

    #[inline]
    #[must_use]
    pub fn tracing_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            backend: self.backend(),
            data_dir: self.data_dir(),
            remote_url: non_blank(self.remote_url.as_deref()),
            remote_key: non_blank(self.remote_key.as_deref()),
            remote_table: non_blank(self.remote_table.as_deref())
                .unwrap_or_else(|| DEFAULT_REMOTE_TABLE.to_string()),
            remote_timeout: self.remote_timeout(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_remote_timeout_ms(value: u64) -> Result<u64, String> {
    if !(MIN_REMOTE_TIMEOUT_MS..=MAX_REMOTE_TIMEOUT_MS).contains(&value) {
        return Err(format!(
            "remote timeout must be between {MIN_REMOTE_TIMEOUT_MS} and {MAX_REMOTE_TIMEOUT_MS} ms"
        ));
    }
    Ok(value)
}

fn parse_remote_timeout_ms(raw: &str) -> Result<u64, String> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid remote timeout '{raw}'"))?;
    check_remote_timeout_ms(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    const ENV_KEYS: [&str; 5] = [
        "CYBERVAULT_BACKEND",
        "CYBERVAULT_DATA_DIR",
        "CYBERVAULT_REMOTE_URL",
        "CYBERVAULT_REMOTE_KEY",
        "CYBERVAULT_CONFIG",
    ];

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_env() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    fn unique_path(suffix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        env::temp_dir().join(format!("cybervault-config-{suffix}-{nanos}.toml"))
    }

    #[test]
    fn defaults_resolve_to_local_store() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();
        let cfg = AppConfig::parse_from(["cybervault"]);
        let store = cfg.store_config();
        assert_eq!(store.backend, StoreBackend::Local);
        assert_eq!(store.remote_table, DEFAULT_REMOTE_TABLE);
        assert_eq!(
            store.remote_timeout,
            Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS)
        );
        assert!(store.remote_url.is_none());
        assert!(store.data_dir.ends_with(APP_DIR));
        assert!(!cfg.tracing_enabled());
    }

    #[test]
    fn flags_parse_into_store_config() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();
        let cfg = AppConfig::parse_from([
            "cybervault",
            "--backend",
            "remote",
            "--remote-url",
            "https://vault.example.test",
            "--remote-key",
            "anon",
            "--remote-table",
            "people",
            "--remote-timeout-ms",
            "2500",
        ]);
        let store = cfg.store_config();
        assert_eq!(store.backend, StoreBackend::Remote);
        assert_eq!(
            store.remote_url.as_deref(),
            Some("https://vault.example.test")
        );
        assert_eq!(store.remote_key.as_deref(), Some("anon"));
        assert_eq!(store.remote_table, "people");
        assert_eq!(store.remote_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn env_fallbacks_apply_when_flags_absent() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();
        unsafe {
            env::set_var("CYBERVAULT_BACKEND", "remote");
            env::set_var("CYBERVAULT_DATA_DIR", "/tmp/vault-env");
        }
        let cfg = AppConfig::parse_from(["cybervault"]);
        assert_eq!(cfg.backend(), StoreBackend::Remote);
        assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/vault-env"));

        let flagged = AppConfig::parse_from(["cybervault", "--backend", "local"]);
        assert_eq!(flagged.backend(), StoreBackend::Local);
        clear_env();
    }

    #[test]
    fn timeout_parser_enforces_bounds() {
        assert_eq!(parse_remote_timeout_ms("1"), Ok(1));
        assert_eq!(parse_remote_timeout_ms("120000"), Ok(120_000));
        assert!(parse_remote_timeout_ms("0").is_err());
        assert!(parse_remote_timeout_ms("120001").is_err());
        assert!(parse_remote_timeout_ms("soon").is_err());
        assert!(AppConfig::try_parse_from(["cybervault", "--remote-timeout-ms", "0"]).is_err());
    }

    #[test]
    fn search_and_json_require_list() {
        assert!(AppConfig::try_parse_from(["cybervault", "--search", "alice"]).is_err());
        assert!(AppConfig::try_parse_from(["cybervault", "--json"]).is_err());
        let cfg = AppConfig::try_parse_from(["cybervault", "--list", "--search", "alice", "--json"])
            .expect("list flags parse");
        assert!(cfg.list && cfg.json);
        assert_eq!(cfg.search.as_deref(), Some("alice"));
    }

    #[test]
    fn file_fills_only_unset_fields() {
        let mut cfg = AppConfig {
            remote_table: Some("cli_table".to_string()),
            ..AppConfig::default()
        };
        cfg.apply_file(FileConfig {
            backend: Some(StoreBackend::Remote),
            remote_url: Some("https://file.example.test".to_string()),
            remote_table: Some("file_table".to_string()),
            remote_timeout_ms: Some(3000),
            logs: Some(true),
            ..FileConfig::default()
        });
        assert_eq!(cfg.backend(), StoreBackend::Remote);
        assert_eq!(cfg.remote_table.as_deref(), Some("cli_table"));
        assert_eq!(cfg.remote_timeout(), Duration::from_millis(3000));
        assert!(cfg.tracing_enabled());

        cfg.no_logs = true;
        assert!(!cfg.tracing_enabled());
    }

    #[test]
    fn load_reads_known_keys_and_ignores_unknown() {
        let path = unique_path("load");
        fs::write(
            &path,
            "backend = \"remote\"\nremote_url = \"https://x.test\"\nremote_timeout_ms = 500\nlogs = true\ntheme = \"neon\"\n",
        )
        .expect("write config");
        let file = FileConfig::load(&path).expect("load");
        assert_eq!(file.backend, Some(StoreBackend::Remote));
        assert_eq!(file.remote_url.as_deref(), Some("https://x.test"));
        assert_eq!(file.remote_timeout_ms, Some(500));
        assert_eq!(file.logs, Some(true));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let path = unique_path("missing");
        assert_eq!(FileConfig::load(&path).expect("load"), FileConfig::default());
    }

    #[test]
    fn load_reports_broken_files() {
        let path = unique_path("broken");
        fs::write(&path, "backend = [not toml").expect("write config");
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigFileError::Parse { .. })
        ));

        fs::write(&path, "remote_timeout_ms = 0\n").expect("write config");
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigFileError::Invalid { .. })
        ));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn explicit_config_path_wins() {
        let cfg = AppConfig {
            config: Some(PathBuf::from("/tmp/custom.toml")),
            ..AppConfig::default()
        };
        assert_eq!(cfg.config_path(), Some(PathBuf::from("/tmp/custom.toml")));
    }

    #[test]
    fn blank_remote_values_are_dropped() {
        let cfg = AppConfig {
            remote_url: Some("   ".to_string()),
            remote_table: Some(String::new()),
            ..AppConfig::default()
        };
        let store = cfg.store_config();
        assert!(store.remote_url.is_none());
        assert_eq!(store.remote_table, DEFAULT_REMOTE_TABLE);
    }
}
