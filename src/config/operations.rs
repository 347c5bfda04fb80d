//! Config loading, coercion, and validation.

use super::model::LockConfig;
use super::types::{
    Coercion, FOREVER_SPELLINGS, MAX_PRINCIPAL_LEN, RawLockOptions, default_principal,
    describe_value,
};
use crate::diagnostics::TraceFormat;
use crate::error::{LockError, Result};
use crate::locks::{LockMode, LockTimeout};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

impl RawLockOptions {
    /// Parse raw options from a YAML string. An empty document is valid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Configuration(format!("failed to parse options YAML: {}", e)))
    }

    /// Load raw options from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Io(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }
}

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(LockConfig)` - Loaded config; check `coercions` for replaced values
    /// * `Err(LockError::Io)` - The file could not be read
    /// * `Err(LockError::Configuration)` - Parse error, strict-mode rejection,
    ///   or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_raw(&RawLockOptions::load(path)?)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_raw(&RawLockOptions::from_yaml(yaml)?)
    }

    /// Build a config from raw options.
    ///
    /// Invalid values fall back to their defaults (mode: Exclusive,
    /// timeout: 0, diagnostics off) and are listed in `coercions`. With
    /// `strict: true` any coercion is a `Configuration` error instead.
    pub fn from_raw(raw: &RawLockOptions) -> Result<Self> {
        let mut coercions = Vec::new();
        let defaults = LockConfig::default();

        let strict = match &raw.strict {
            None | Some(Value::Null) => defaults.strict,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                coercions.push(coerced("strict", other, "false"));
                false
            }
        };

        let mode = match &raw.mode {
            None | Some(Value::Null) => defaults.mode,
            Some(value) => match value.as_str().and_then(LockMode::from_str) {
                Some(mode) => mode,
                None => {
                    coercions.push(coerced("mode", value, LockMode::Exclusive.as_str()));
                    LockMode::Exclusive
                }
            },
        };

        let timeout_millis = match &raw.timeout_millis {
            None | Some(Value::Null) => defaults.timeout_millis,
            Some(value) => match parse_timeout(value) {
                Some(timeout) => timeout,
                None => {
                    coercions.push(coerced("timeout_millis", value, "0"));
                    LockTimeout::Millis(0)
                }
            },
        };

        let diagnostics_enabled = match &raw.diagnostics_enabled {
            None | Some(Value::Null) => defaults.diagnostics_enabled,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                coercions.push(coerced("diagnostics_enabled", other, "false"));
                false
            }
        };

        let diagnostics_sink = match &raw.diagnostics_sink {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(PathBuf::from(s)),
            Some(other) => {
                coercions.push(coerced("diagnostics_sink", other, "no file"));
                None
            }
        };

        let diagnostics_format = match &raw.diagnostics_format {
            None | Some(Value::Null) => defaults.diagnostics_format,
            Some(value) => match value.as_str().and_then(TraceFormat::from_str) {
                Some(format) => format,
                None => {
                    coercions.push(coerced("diagnostics_format", value, "text"));
                    TraceFormat::Text
                }
            },
        };

        let principal = match &raw.principal {
            None | Some(Value::Null) => defaults.principal,
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(other) => {
                coercions.push(coerced("principal", other, &default_principal()));
                default_principal()
            }
        };

        if strict && !coercions.is_empty() {
            let details: Vec<String> = coercions.iter().map(|c| c.to_string()).collect();
            return Err(LockError::Configuration(format!(
                "strict options rejected: {}",
                details.join("; ")
            )));
        }

        let config = LockConfig {
            mode,
            timeout_millis,
            diagnostics_enabled,
            diagnostics_sink,
            diagnostics_format,
            principal,
            strict,
            coercions,
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LockError::Configuration(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `principal` must be non-empty and at most 128 characters
    pub fn validate(&self) -> Result<()> {
        if self.principal.is_empty() {
            return Err(LockError::Configuration(
                "config validation failed: principal must not be empty".to_string(),
            ));
        }

        if self.principal.chars().count() > MAX_PRINCIPAL_LEN {
            return Err(LockError::Configuration(format!(
                "config validation failed: principal must be at most {} characters",
                MAX_PRINCIPAL_LEN
            )));
        }

        Ok(())
    }
}

fn parse_timeout(value: &Value) -> Option<LockTimeout> {
    match value {
        Value::Number(n) => n.as_i64().and_then(LockTimeout::from_millis),
        Value::String(s) if FOREVER_SPELLINGS.contains(&s.as_str()) => Some(LockTimeout::Forever),
        _ => None,
    }
}

fn coerced(key: &str, rejected: &Value, applied: &str) -> Coercion {
    Coercion {
        key: key.to_string(),
        rejected: describe_value(rejected),
        applied: applied.to_string(),
    }
}
