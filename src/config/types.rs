//! Raw option input, coercion notes and default values.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Untyped lock options as supplied by a caller or a YAML file.
///
/// Every field is kept as a raw YAML value so that wrong types survive
/// parsing and can be coerced instead of failing the whole document.
/// Unknown keys are ignored. camelCase aliases are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLockOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Value>,

    #[serde(alias = "timeoutMillis", skip_serializing_if = "Option::is_none")]
    pub timeout_millis: Option<Value>,

    #[serde(alias = "diagnosticsEnabled", skip_serializing_if = "Option::is_none")]
    pub diagnostics_enabled: Option<Value>,

    /// File path that receives trace lines.
    #[serde(alias = "diagnosticsSink", skip_serializing_if = "Option::is_none")]
    pub diagnostics_sink: Option<Value>,

    #[serde(alias = "diagnosticsFormat", skip_serializing_if = "Option::is_none")]
    pub diagnostics_format: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,

    /// Reject invalid values instead of coercing them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<Value>,
}

impl RawLockOptions {
    /// Set a key from a string value, as a command-line override would.
    ///
    /// Integers and booleans are recognized so that `timeout_millis=500`
    /// arrives as a number. Returns `false` for unrecognized keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let value = serde_yaml::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        let slot = match key {
            "mode" => &mut self.mode,
            "timeout_millis" | "timeoutMillis" => &mut self.timeout_millis,
            "diagnostics_enabled" | "diagnosticsEnabled" => &mut self.diagnostics_enabled,
            "diagnostics_sink" | "diagnosticsSink" => &mut self.diagnostics_sink,
            "diagnostics_format" | "diagnosticsFormat" => &mut self.diagnostics_format,
            "principal" => &mut self.principal,
            "strict" => &mut self.strict,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Record of one option that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coercion {
    /// Option key.
    pub key: String,

    /// The rejected input, rendered as YAML.
    pub rejected: String,

    /// The value used instead.
    pub applied: String,
}

impl std::fmt::Display for Coercion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} '{}', using {}",
            self.key, self.rejected, self.applied
        )
    }
}

/// Render a raw value for coercion notes.
pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}

/// Timeout spellings accepted for an unbounded wait.
pub const FOREVER_SPELLINGS: [&str; 2] = ["forever", "infinite"];

// Default value functions
pub(crate) fn default_principal() -> String {
    "public".to_string()
}

/// Longest principal name the resource manager accepts (`sysname`).
pub const MAX_PRINCIPAL_LEN: usize = 128;
