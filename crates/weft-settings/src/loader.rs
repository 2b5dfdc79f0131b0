//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If `~/.weft/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `WEFT_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use weft_core::logging::LogFormat;

use crate::errors::{Result, SettingsError};
use crate::types::{ClientSettings, DispatchMethod};

/// Resolve the path to the settings file (`~/.weft/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".weft").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_settings_with_env(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let defaults = serde_json::to_value(ClientSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClientSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `WEFT_*` overrides looked up through `env`.
///
/// Integers must parse and fall within range; invalid values are ignored
/// with a warning and the file/default value stays.
pub fn apply_env_overrides(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    let reader = EnvReader { env };

    // ── Connection ──────────────────────────────────────────────────
    if let Some(v) = reader.string("WEFT_ENDPOINT") {
        settings.connection.endpoint = v;
    }
    if let Some(v) = reader.u64("WEFT_RECONNECT_DELAY_MS", 10, 600_000) {
        settings.connection.reconnect_delay_ms = v;
    }
    if let Some(v) = reader.u64("WEFT_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.connection.connect_timeout_ms = v;
    }
    if let Some(v) = reader.u64("WEFT_REQUEST_TIMEOUT_MS", 100, 3_600_000) {
        settings.connection.request_timeout_ms = v;
    }
    if let Some(v) = reader.u64("WEFT_ACK_SWEEP_INTERVAL_MS", 10, 60_000) {
        settings.connection.ack_sweep_interval_ms = v;
    }
    if let Some(v) = reader.usize("WEFT_SEND_QUEUE_CAPACITY", 1, 100_000) {
        settings.connection.send_queue_capacity = v;
    }

    // ── Dispatch ────────────────────────────────────────────────────
    if let Some(v) = reader.string("WEFT_DISPATCH_URL") {
        settings.dispatch.url = Some(v);
    }
    if let Some(v) = reader.parsed("WEFT_DISPATCH_METHOD", DispatchMethod::parse) {
        settings.dispatch.method = v;
    }
    if let Some(v) = reader.string("WEFT_SESSION_HEADER") {
        settings.dispatch.session_header = v;
    }
    if let Some(v) = reader.string("WEFT_EVENT_OBJECT_ID") {
        settings.dispatch.event_object_id = v;
    }
    if let Some(v) = reader.u64("WEFT_HTTP_TIMEOUT_MS", 100, 3_600_000) {
        settings.dispatch.http_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = reader.string("WEFT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = reader.parsed("WEFT_LOG_FORMAT", parse_log_format) {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (`compact` or `json`).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_ascii_lowercase().as_str() {
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use weft_core::logging::capture_logs;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"connection": {"endpoint": "a", "reconnectDelayMs": 3000}});
        let source = serde_json::json!({"connection": {"reconnectDelayMs": 500}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["connection"]["reconnectDelayMs"], 500);
        assert_eq!(merged["connection"]["endpoint"], "a");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_and_primitive_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3], "a": {"nested": true}}),
            serde_json::json!({"items": [4], "a": 42}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
        assert_eq!(merged["a"], 42);
    }

    // ── load_settings_with_env ──────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings =
            load_settings_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"endpoint": "wss://example.com/ws"}, "dispatch": {"url": "https://example.com/d", "method": "PUT"}}"#,
        )
        .unwrap();

        let settings = load_settings_with_env(&path, no_env).unwrap();
        assert_eq!(settings.connection.endpoint, "wss://example.com/ws");
        assert_eq!(settings.connection.reconnect_delay_ms, 3_000);
        assert_eq!(settings.dispatch.url.as_deref(), Some("https://example.com/d"));
        assert_eq!(settings.dispatch.method, DispatchMethod::Put);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with_env(&path, no_env);
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"sendQueueCapacity": 0}}"#).unwrap();

        let result = load_settings_with_env(&path, no_env);
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"reconnectDelayMs": 500}}"#).unwrap();

        let env = env_of(&[
            ("WEFT_RECONNECT_DELAY_MS", "750"),
            ("WEFT_DISPATCH_METHOD", "put"),
            ("WEFT_LOG_FORMAT", "json"),
            ("WEFT_LOG_LEVEL", "weft_client=debug"),
        ]);
        let settings = load_settings_with_env(&path, env).unwrap();
        assert_eq!(settings.connection.reconnect_delay_ms, 750);
        assert_eq!(settings.dispatch.method, DispatchMethod::Put);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "weft_client=debug");
    }

    #[test]
    fn invalid_env_value_is_ignored_with_warning() {
        let (logs, _guard) = capture_logs();
        let mut settings = ClientSettings::default();
        apply_env_overrides(
            &mut settings,
            env_of(&[
                ("WEFT_RECONNECT_DELAY_MS", "soon"),
                ("WEFT_SEND_QUEUE_CAPACITY", "0"),
            ]),
        );
        assert_eq!(settings.connection.reconnect_delay_ms, 3_000);
        assert_eq!(settings.connection.send_queue_capacity, 256);
        assert_eq!(logs.count_at_level(tracing::Level::WARN), 2);
        assert!(logs.has_event(tracing::Level::WARN, "invalid env var"));
    }

    #[test]
    fn empty_env_value_is_unset() {
        let mut settings = ClientSettings::default();
        apply_env_overrides(&mut settings, env_of(&[("WEFT_ENDPOINT", "")]));
        assert_eq!(settings.connection.endpoint, ClientSettings::default().connection.endpoint);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("3000", 10, 600_000), Some(3000));
        assert_eq!(parse_u64_range("5", 10, 600_000), None);
        assert_eq!(parse_u64_range("700000", 10, 600_000), None);
        assert_eq!(parse_u64_range("abc", 10, 600_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("50", 1, 100), Some(50));
        assert_eq!(parse_usize_range("0", 1, 100), None);
    }

    #[test]
    fn parse_log_format_names() {
        assert_eq!(parse_log_format("JSON"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("compact"), Some(LogFormat::Compact));
        assert_eq!(parse_log_format("pretty"), None);
    }
}
