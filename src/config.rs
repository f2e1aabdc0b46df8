//! Configuration for inline tracing.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods
//! 2. **Environment variables**: values from `FIELDTRACE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`TraceConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `FIELDTRACE_ENABLED` | `bool` | `enabled` |
//! | `FIELDTRACE_EXTENSION_KEY` | `String` | `extension_key` |
//! | `FIELDTRACE_ERRORS` | `unmodified` \| `masked` | `errors` |
//! | `FIELDTRACE_REQUIRE_HEADER` | `bool` | `require_header` |

use crate::rewrite::ErrorPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable name for the master switch.
pub const ENV_ENABLED: &str = "FIELDTRACE_ENABLED";
/// Environment variable name for the response extension key.
pub const ENV_EXTENSION_KEY: &str = "FIELDTRACE_EXTENSION_KEY";
/// Environment variable name for the error reporting mode.
pub const ENV_ERRORS: &str = "FIELDTRACE_ERRORS";
/// Environment variable name for the trace-request header requirement.
pub const ENV_REQUIRE_HEADER: &str = "FIELDTRACE_REQUIRE_HEADER";

/// Default response extension key for encoded traces.
pub const DEFAULT_EXTENSION_KEY: &str = "ftv1";

/// Error from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting had a value of the wrong shape.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Setting name.
        var: String,
        /// Value as given.
        value: String,
        /// Description of accepted values.
        expected: &'static str,
    },

    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file was not valid TOML for [`TraceConfig`].
    #[cfg(feature = "config-file")]
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How errors appear in traces, for configurations that cannot carry a hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Errors are reported as produced.
    #[default]
    Unmodified,
    /// Message and extensions are replaced by a placeholder.
    Masked,
}

impl ErrorMode {
    /// The matching error policy.
    #[must_use]
    pub fn policy(self) -> ErrorPolicy {
        match self {
            Self::Unmodified => ErrorPolicy::Unmodified,
            Self::Masked => ErrorPolicy::Masked,
        }
    }

    fn parse(var: &str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unmodified" => Ok(Self::Unmodified),
            "masked" => Ok(Self::Masked),
            _ => Err(ConfigError::InvalidValue {
                var: var.to_owned(),
                value: value.to_owned(),
                expected: "`unmodified` or `masked`",
            }),
        }
    }
}

/// Inline tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Master switch; when off no execution is traced.
    pub enabled: bool,
    /// Response extension key the encoded trace is stored under.
    pub extension_key: String,
    /// Error reporting mode used unless a custom hook is installed.
    pub errors: ErrorMode,
    /// Trace only requests that ask for it via the federation header.
    pub require_header: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extension_key: DEFAULT_EXTENSION_KEY.to_owned(),
            errors: ErrorMode::Unmodified,
            require_header: true,
        }
    }
}

impl TraceConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `FIELDTRACE_*` variables that are set.
    ///
    /// Returns an error if a variable is set but contains an unparseable value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary lookup, keyed by env var name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &val)?;
        }
        if let Some(val) = lookup(ENV_EXTENSION_KEY) {
            let key = val.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: ENV_EXTENSION_KEY.to_owned(),
                    value: val.clone(),
                    expected: "a non-empty key",
                });
            }
            self.extension_key = key.to_owned();
        }
        if let Some(val) = lookup(ENV_ERRORS) {
            self.errors = ErrorMode::parse(ENV_ERRORS, &val)?;
        }
        if let Some(val) = lookup(ENV_REQUIRE_HEADER) {
            self.require_header = parse_bool(ENV_REQUIRE_HEADER, &val)?;
        }
        Ok(())
    }

    /// Parses a TOML document. Missing keys take their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML file, then applies environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Sets the master switch.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the response extension key.
    #[must_use]
    pub fn extension_key(mut self, key: impl Into<String>) -> Self {
        self.extension_key = key.into();
        self
    }

    /// Sets the error reporting mode.
    #[must_use]
    pub fn errors(mut self, mode: ErrorMode) -> Self {
        self.errors = mode;
        self
    }

    /// Sets whether requests must ask for a trace.
    #[must_use]
    pub fn require_header(mut self, require: bool) -> Self {
        self.require_header = require;
        self
    }
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var_name.to_owned(),
            value: val.to_owned(),
            expected: "a boolean",
        }),
    }
}
