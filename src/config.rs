//! Callback configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `config.toml` is read from the directory given by `--config-dir`
//! (default: the current directory). A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [delivery]
//! max_retries = 3           # Total attempts; <= 0 falls back to 3
//! timeout_secs = 60         # Per-attempt request timeout
//! backoff_unit_ms = 1000    # Wait 2^i units after failed attempt i
//!
//! [host]
//! address = "127.0.0.1"     # Workflow host polled for the running prompt id
//! port = 8188
//! username_env = "COMFYUI_USERNAME"
//! password_env = "COMFYUI_PASSWORD"
//!
//! [logging]
//! level = "info"            # Overridden by RUST_LOG
//! verbose = false           # Log raw host context when resolving prompt ids
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::delivery::{DEFAULT_MAX_RETRIES, effective_max_retries, parse_max_retries};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallbackConfig {
    /// Retry, timeout and backoff for result delivery.
    pub delivery: DeliveryConfig,
    /// Where the workflow host runs, for prompt id polling.
    pub host: HostConfig,
    /// Log filter and verbosity.
    pub logging: LoggingConfig,
}

impl CallbackConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// `delivery.max_retries` is deliberately not checked: any value is
    /// accepted and non-positive ones fall back to the default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "delivery.timeout_secs must be positive".into(),
            ));
        }
        if self.host.address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "host.address must not be empty".into(),
            ));
        }
        if self.host.port == 0 {
            return Err(ConfigError::Validation("host.port must be non-zero".into()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Result delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Total attempts per delivery. Non-positive or non-integer values mean
    /// the default.
    #[serde(deserialize_with = "lenient_max_retries")]
    pub max_retries: i64,
    /// Request timeout for each attempt, in seconds.
    pub timeout_secs: u64,
    /// Backoff unit in milliseconds; attempt `i` is followed by `2^i` units.
    pub backoff_unit_ms: u64,
}

impl DeliveryConfig {
    /// Attempt limit after coercion.
    pub fn attempts(&self) -> u32 {
        effective_max_retries(Some(self.max_retries))
    }
}

/// Accept any TOML value for `max_retries`. Integers pass through, numeric
/// strings are parsed, and everything else (`2.5`, `"abc"`, `true`) becomes
/// the default.
fn lenient_max_retries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = toml::Value::deserialize(deserializer)?;
    let max_retries = match value {
        toml::Value::Integer(n) => n,
        toml::Value::String(s) => i64::from(parse_max_retries(&s)),
        other => {
            tracing::warn!(value = %other, "delivery.max_retries is not an integer, using default");
            i64::from(DEFAULT_MAX_RETRIES)
        }
    };
    Ok(max_retries)
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: i64::from(DEFAULT_MAX_RETRIES),
            timeout_secs: 60,
            backoff_unit_ms: 1000,
        }
    }
}

/// Workflow host location and credential variable names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub address: String,
    pub port: u16,
    /// Environment variable holding the HTTP Basic user name.
    pub username_env: String,
    /// Environment variable holding the HTTP Basic password.
    pub password_env: String,
}

impl HostConfig {
    /// `http://<address>:<port>/queue`
    pub fn queue_url(&self) -> String {
        format!("http://{}:{}/queue", self.address, self.port)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8188,
            username_env: "COMFYUI_USERNAME".to_string(),
            password_env: "COMFYUI_PASSWORD".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Log the raw host context while resolving prompt ids.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(CallbackConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CallbackConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CallbackConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// The directory itself must exist; only the file inside it is optional.
pub fn load_config(dir: &Path) -> Result<CallbackConfig, ConfigError> {
    if !crate::fsutil::is_dir(dir) {
        return Err(ConfigError::Validation(format!(
            "config directory {} does not exist",
            dir.display()
        )));
    }
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Fully-commented stock `config.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# workflow-callback configuration
# ===============================
# All settings are optional. Values shown are the defaults.
# Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Result delivery
# ---------------------------------------------------------------------------
[delivery]
# Total attempts per delivery (first try included).
# Zero, negative, or missing falls back to 3.
max_retries = 3

# Request timeout for each attempt, in seconds.
timeout_secs = 60

# Backoff unit in milliseconds. After failed attempt i (0-based) the
# client waits 2^i units: 1s, 2s, 4s, ... with the default.
backoff_unit_ms = 1000

# ---------------------------------------------------------------------------
# Workflow host (prompt-id polling via GET /queue)
# ---------------------------------------------------------------------------
[host]
address = "127.0.0.1"
port = 8188

# Environment variables holding HTTP Basic credentials for the host.
# The Authorization header is only sent when both are non-empty.
username_env = "COMFYUI_USERNAME"
password_env = "COMFYUI_PASSWORD"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive, e.g. "debug" or "workflow_callback=trace".
# RUST_LOG takes precedence when set.
level = "info"

# Log the raw prompt / extra_pnginfo / unique_id context the host passes in.
verbose = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = CallbackConfig::default();
        assert_eq!(config.delivery.max_retries, 3);
        assert_eq!(config.delivery.timeout_secs, 60);
        assert_eq!(config.delivery.backoff_unit_ms, 1000);
        assert_eq!(config.host.port, 8188);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.verbose);
    }

    #[test]
    fn queue_url_from_host() {
        let host = HostConfig {
            address: "10.0.0.5".into(),
            port: 9000,
            ..HostConfig::default()
        };
        assert_eq!(host.queue_url(), "http://10.0.0.5:9000/queue");
    }

    #[test]
    fn non_positive_max_retries_resolve_to_default() {
        let delivery = DeliveryConfig {
            max_retries: -2,
            ..DeliveryConfig::default()
        };
        assert_eq!(delivery.attempts(), 3);
    }

    #[test]
    fn parse_partial_config() {
        let config: CallbackConfig = toml::from_str(
            r#"
[delivery]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.delivery.max_retries, 5);
        assert_eq!(config.delivery.timeout_secs, 60);
        assert_eq!(config.host.address, "127.0.0.1");
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let parsed: CallbackConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = CallbackConfig::default();
        assert_eq!(parsed.delivery.max_retries, defaults.delivery.max_retries);
        assert_eq!(parsed.delivery.timeout_secs, defaults.delivery.timeout_secs);
        assert_eq!(parsed.host.username_env, defaults.host.username_env);
        assert_eq!(parsed.logging.level, defaults.logging.level);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.delivery.timeout_secs, 60);
    }

    #[test]
    fn load_config_rejects_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("no-such-dir"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[host]
port = 9999

[logging]
verbose = true
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.host.port, 9999);
        assert!(config.logging.verbose);
        // Unspecified values should be defaults
        assert_eq!(config.host.address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[delivery]\ntimeout_secs = 0\n",
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_max_retries_is_accepted() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[delivery]\nmax_retries = -1\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.delivery.attempts(), 3);
    }

    #[test]
    fn non_integer_max_retries_fall_back_to_default() {
        for raw in ["2.5", "\"abc\"", "true", "[1, 2]"] {
            let tmp = TempDir::new().unwrap();
            fs::write(
                tmp.path().join("config.toml"),
                format!("[delivery]\nmax_retries = {raw}\n"),
            )
            .unwrap();

            let config = load_config(tmp.path()).unwrap();
            assert_eq!(config.delivery.attempts(), 3, "max_retries = {raw}");
        }
    }

    #[test]
    fn numeric_string_max_retries_is_parsed() {
        let config: CallbackConfig =
            toml::from_str("[delivery]\nmax_retries = \" 4 \"\n").unwrap();
        assert_eq!(config.delivery.attempts(), 4);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"port = 8188"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"port = 9000"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("port").unwrap().as_integer(), Some(9000));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[delivery]
max_retries = 3
timeout_secs = 60
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[delivery]
timeout_secs = 10
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let delivery = merged.get("delivery").unwrap();
        assert_eq!(delivery.get("timeout_secs").unwrap().as_integer(), Some(10));
        assert_eq!(delivery.get("max_retries").unwrap().as_integer(), Some(3));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<CallbackConfig, _> = toml::from_str(
            r#"
[delivery]
max_retry = 3
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<CallbackConfig, _> = toml::from_str("[deliveri]\nmax_retries = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[logging]\ncolour = true\n").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
