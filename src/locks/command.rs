//! Command batches sent to the resource manager.
//!
//! Each command renders to one self-contained T-SQL batch. Resource names are
//! embedded as `N'...'` literals with quotes doubled. The catalog filter
//! escapes `LIKE` metacharacters and anchors the name between `:[` and `]:(`.

use super::connection::APPLICATION_RESOURCE_TYPE;
use super::types::{LockMode, LockTimeout, catalog_name};

/// A unit of work for the resource manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request the lock and confirm it in the catalog, in one transaction.
    Acquire {
        resource: String,
        mode: LockMode,
        timeout: LockTimeout,
        principal: String,
    },
    /// Release one session-owned reference and re-read the catalog.
    Release { resource: String, principal: String },
    /// Read the catalog only.
    Probe { resource: String },
}

impl Command {
    /// The resource name this command targets.
    pub fn resource(&self) -> &str {
        match self {
            Command::Acquire { resource, .. }
            | Command::Release { resource, .. }
            | Command::Probe { resource } => resource,
        }
    }

    /// Short name of the operation, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Acquire { .. } => "acquire",
            Command::Release { .. } => "release",
            Command::Probe { .. } => "probe",
        }
    }

    /// Render the batch as T-SQL.
    pub fn to_sql(&self) -> String {
        match self {
            Command::Acquire {
                resource,
                mode,
                timeout,
                principal,
            } => format!(
                "BEGIN TRAN
DECLARE @returnCode INT
EXEC @returnCode = sp_getapplock
    @Resource = {resource},
    @LockMode = '{mode}',
    @LockOwner = 'Session',
    @LockTimeout = {timeout},
    @DbPrincipal = {principal}
{catalog}
IF @returnCode NOT IN (0, 1)
BEGIN
    ROLLBACK TRAN
    RAISERROR ('Unable to acquire lock', 16, 1)
    RETURN
END
COMMIT TRAN",
                resource = quote_literal(resource),
                mode = mode.as_str(),
                timeout = timeout.as_sql_value(),
                principal = quote_literal(principal),
                catalog = catalog_query(resource, true),
            ),
            Command::Release {
                resource,
                principal,
            } => format!(
                "DECLARE @returnCode INT
EXEC @returnCode = sp_releaseapplock
    @Resource = {resource},
    @DbPrincipal = {principal},
    @LockOwner = 'Session'
{catalog}",
                resource = quote_literal(resource),
                principal = quote_literal(principal),
                catalog = catalog_query(resource, true),
            ),
            Command::Probe { resource } => format!("{};", catalog_query(resource, false)),
        }
    }
}

fn catalog_query(resource: &str, with_return_code: bool) -> String {
    let columns = if with_return_code {
        "@returnCode AS return_code, resource_type, request_mode, resource_description"
    } else {
        "resource_type, request_mode, resource_description"
    };
    format!(
        "SELECT {}
FROM sys.dm_tran_locks
WHERE resource_type = '{}' AND resource_description LIKE {}",
        columns,
        APPLICATION_RESOURCE_TYPE,
        quote_literal(&like_pattern(resource))
    )
}

/// Render a Unicode string literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Build the `LIKE` pattern matching `:[<name>]:(` inside a resource
/// description. Only the first
/// [`CATALOG_NAME_LEN`](super::types::CATALOG_NAME_LEN) characters are compared,
/// since that is all the catalog keeps.
pub fn like_pattern(name: &str) -> String {
    let name = catalog_name(name);
    let mut escaped = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            '%' => escaped.push_str("[%]"),
            '_' => escaped.push_str("[_]"),
            other => escaped.push(other),
        }
    }
    format!("%:[[]{}]:(%", escaped)
}
