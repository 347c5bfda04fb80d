//! Lock modes, timeouts, held state and status-code definitions.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Longest resource name `sp_getapplock` accepts (`@Resource nvarchar(255)`).
pub const MAX_RESOURCE_LEN: usize = 255;

/// Characters of the name that `sys.dm_tran_locks.resource_description`
/// shows for an application lock: `<principal>:[<name prefix>]:(<hash>)`.
pub const CATALOG_NAME_LEN: usize = 32;

/// The part of `name` the lock catalog reports.
pub fn catalog_name(name: &str) -> &str {
    match name.char_indices().nth(CATALOG_NAME_LEN) {
        Some((end, _)) => &name[..end],
        None => name,
    }
}

/// Lock mode requested from the resource manager.
///
/// Compatibility between modes is decided by the resource manager; the
/// handle only forwards the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum LockMode {
    Shared,
    Update,
    #[default]
    Exclusive,
    IntentExclusive,
    IntentShared,
}

impl LockMode {
    /// All modes, in `sp_getapplock` documentation order.
    pub const ALL: [LockMode; 5] = [
        LockMode::Shared,
        LockMode::Update,
        LockMode::Exclusive,
        LockMode::IntentExclusive,
        LockMode::IntentShared,
    ];

    /// Parse a mode from its `@LockMode` spelling.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Shared" => Some(Self::Shared),
            "Update" => Some(Self::Update),
            "Exclusive" => Some(Self::Exclusive),
            "IntentExclusive" => Some(Self::IntentExclusive),
            "IntentShared" => Some(Self::IntentShared),
            _ => None,
        }
    }

    /// The `@LockMode` parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "Shared",
            LockMode::Update => "Update",
            LockMode::Exclusive => "Exclusive",
            LockMode::IntentExclusive => "IntentExclusive",
            LockMode::IntentShared => "IntentShared",
        }
    }

    /// The `request_mode` value reported by the lock catalog.
    pub fn catalog_code(&self) -> &'static str {
        match self {
            LockMode::Shared => "S",
            LockMode::Update => "U",
            LockMode::Exclusive => "X",
            LockMode::IntentExclusive => "IX",
            LockMode::IntentShared => "IS",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long the resource manager may wait before refusing a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum LockTimeout {
    /// Wait up to this many milliseconds. Zero fails immediately.
    Millis(u32),
    /// Wait until the lock is granted.
    Forever,
}

impl LockTimeout {
    /// The resource manager's sentinel for an unbounded wait.
    pub const FOREVER_SENTINEL: i64 = -1;

    /// Largest wait the `@LockTimeout int` parameter accepts.
    pub const MAX_MILLIS: i64 = i32::MAX as i64;

    /// Interpret a raw `@LockTimeout` value.
    ///
    /// Returns `None` for negative values other than the sentinel and for
    /// values that do not fit the parameter.
    pub fn from_millis(millis: i64) -> Option<Self> {
        match millis {
            Self::FOREVER_SENTINEL => Some(Self::Forever),
            0..=Self::MAX_MILLIS => Some(Self::Millis(millis as u32)),
            _ => None,
        }
    }

    /// The value passed as `@LockTimeout`.
    pub fn as_sql_value(&self) -> i64 {
        match self {
            LockTimeout::Millis(ms) => i64::from(*ms),
            LockTimeout::Forever => Self::FOREVER_SENTINEL,
        }
    }
}

impl Default for LockTimeout {
    fn default() -> Self {
        LockTimeout::Millis(0)
    }
}

impl From<LockTimeout> for i64 {
    fn from(timeout: LockTimeout) -> Self {
        timeout.as_sql_value()
    }
}

impl std::fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockTimeout::Millis(ms) => write!(f, "{}ms", ms),
            LockTimeout::Forever => f.write_str("forever"),
        }
    }
}

/// What the handle believes about its own hold on the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeldState {
    #[default]
    NotHeld,
    Held,
    /// A release or probe failed in transit; re-probe before trusting either answer.
    Unknown,
}

impl std::fmt::Display for HeldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeldState::NotHeld => write!(f, "not held"),
            HeldState::Held => write!(f, "held"),
            HeldState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Return code of `sp_getapplock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// 0: granted synchronously.
    Granted,
    /// 1: granted after waiting for incompatible locks to be released.
    GrantedAfterWait,
    /// -1: the request timed out.
    TimedOut,
    /// -2: the request was cancelled.
    Cancelled,
    /// -3: the request was chosen as a deadlock victim.
    DeadlockVictim,
    /// -999: parameter validation or other call error.
    CallError,
    Other(i32),
}

impl AcquireStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Granted,
            1 => Self::GrantedAfterWait,
            -1 => Self::TimedOut,
            -2 => Self::Cancelled,
            -3 => Self::DeadlockVictim,
            -999 => Self::CallError,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Granted => 0,
            Self::GrantedAfterWait => 1,
            Self::TimedOut => -1,
            Self::Cancelled => -2,
            Self::DeadlockVictim => -3,
            Self::CallError => -999,
            Self::Other(code) => *code,
        }
    }

    /// Only 0 and 1 commit the acquire batch.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Granted | Self::GrantedAfterWait)
    }
}

impl std::fmt::Display for AcquireStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Granted => "granted",
            Self::GrantedAfterWait => "granted after wait",
            Self::TimedOut => "request timed out",
            Self::Cancelled => "request was cancelled",
            Self::DeadlockVictim => "request was chosen as deadlock victim",
            Self::CallError => "parameter validation or call error",
            Self::Other(_) => "unrecognized return code",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Point-in-time view of a handle, for display and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct HandleStatus {
    pub name: String,
    pub mode: LockMode,
    pub timeout_millis: LockTimeout,
    pub state: HeldState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<DateTime<Utc>>,
    pub error_count: usize,
}

impl HandleStatus {
    /// Format how long the lock has been held as a human-readable string.
    pub fn held_for(&self) -> Option<String> {
        let age = Utc::now().signed_duration_since(self.acquired_at?);
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        Some(if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        })
    }
}

impl std::fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (mode: {}, timeout: {}, state: {}{})",
            self.name,
            self.mode,
            self.timeout_millis,
            self.state,
            match self.held_for() {
                Some(age) => format!(", held for {}", age),
                None => String::new(),
            }
        )
    }
}
