//! In-process resource manager.
//!
//! Arbitrates application locks the way SQL Server does for
//! `@LockOwner = 'Session'`: grants are reference counted per session, a
//! session never conflicts with itself, and closing a session drops all of
//! its locks. Incompatible requests wait on a condition variable for up to
//! the requested timeout.
//!
//! Used by the test suite and by `applock demo`; production code talks to a
//! real server through its own [`Connection`] adapter.

use super::command::Command;
use super::connection::{
    APPLICATION_RESOURCE_TYPE, CatalogRow, Connection, ConnectionError, ResultSet,
};
use super::types::{AcquireStatus, LockMode, LockTimeout, MAX_RESOURCE_LEN, catalog_name};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Return code of `sp_releaseapplock` when the lock is not held.
const RELEASE_NOT_HELD: i32 = -999;

/// Whether `requested` can be granted while another session holds `granted`.
pub fn modes_compatible(requested: LockMode, granted: LockMode) -> bool {
    use LockMode::*;
    match (requested, granted) {
        (Exclusive, _) | (_, Exclusive) => false,
        (IntentShared, _) | (_, IntentShared) => true,
        (Shared, Shared) | (Shared, Update) | (Update, Shared) => true,
        (IntentExclusive, IntentExclusive) => true,
        _ => false,
    }
}

#[derive(Debug)]
struct Grant {
    resource: String,
    session: u64,
    mode: LockMode,
    count: u32,
}

#[derive(Debug, Default)]
struct State {
    next_session: u64,
    grants: Vec<Grant>,
}

impl State {
    fn can_grant(&self, session: u64, resource: &str, mode: LockMode) -> bool {
        self.grants
            .iter()
            .filter(|g| g.resource == resource && g.session != session)
            .all(|g| modes_compatible(mode, g.mode))
    }

    fn grant(&mut self, session: u64, resource: &str, mode: LockMode) {
        match self
            .grants
            .iter_mut()
            .find(|g| g.resource == resource && g.session == session && g.mode == mode)
        {
            Some(existing) => existing.count += 1,
            None => self.grants.push(Grant {
                resource: resource.to_string(),
                session,
                mode,
                count: 1,
            }),
        }
    }

    fn release(&mut self, session: u64, resource: &str) -> bool {
        let Some(index) = self
            .grants
            .iter()
            .position(|g| g.resource == resource && g.session == session)
        else {
            return false;
        };

        self.grants[index].count -= 1;
        if self.grants[index].count == 0 {
            self.grants.remove(index);
        }
        true
    }

    fn release_session(&mut self, session: u64) -> bool {
        let before = self.grants.len();
        self.grants.retain(|g| g.session != session);
        self.grants.len() != before
    }

    /// Rows whose description contains `:[<name prefix>]:(`, as the catalog
    /// `LIKE` filter matches them.
    fn catalog(&self, name: &str) -> Vec<CatalogRow> {
        let needle = format!(":[{}]:(", catalog_name(name));
        self.grants
            .iter()
            .map(|g| CatalogRow {
                resource_type: APPLICATION_RESOURCE_TYPE.to_string(),
                request_mode: g.mode.catalog_code().to_string(),
                resource_description: describe_resource(&g.resource),
            })
            .filter(|row| row.resource_description.contains(&needle))
            .collect()
    }
}

/// `resource_description` as the catalog reports it:
/// `0:[<first 32 characters>]:(<hash of the full name>)`.
fn describe_resource(name: &str) -> String {
    // FNV-1a
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    format!("0:[{}]:({:08x})", catalog_name(name), hash)
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    released: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// A resource manager living in this process.
///
/// Cloning yields another handle to the same lock table.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceManager {
    shared: Arc<Shared>,
}

impl MemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session.
    pub fn connect(&self) -> MemorySession {
        let id = {
            let mut state = self.shared.lock();
            state.next_session += 1;
            state.next_session
        };
        MemorySession {
            manager: self.clone(),
            id,
            open: true,
            pending_failures: VecDeque::new(),
        }
    }

    /// Current catalog rows for a resource name.
    pub fn catalog(&self, resource: &str) -> Vec<CatalogRow> {
        self.shared.lock().catalog(resource)
    }

    fn get_applock(
        &self,
        session: u64,
        resource: &str,
        mode: LockMode,
        timeout: LockTimeout,
    ) -> i32 {
        let deadline = match timeout {
            LockTimeout::Millis(ms) => Some(Instant::now() + Duration::from_millis(u64::from(ms))),
            LockTimeout::Forever => None,
        };

        let mut state = self.shared.lock();
        let mut waited = false;
        loop {
            if state.can_grant(session, resource, mode) {
                state.grant(session, resource, mode);
                return if waited {
                    AcquireStatus::GrantedAfterWait.code()
                } else {
                    AcquireStatus::Granted.code()
                };
            }

            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return AcquireStatus::TimedOut.code();
                    }
                    self.shared
                        .released
                        .wait_timeout(state, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poison| poison.into_inner().0)
                }
                None => self
                    .shared
                    .released
                    .wait(state)
                    .unwrap_or_else(|poison| poison.into_inner()),
            };
            waited = true;
        }
    }

    fn release_applock(&self, session: u64, resource: &str) -> i32 {
        let released = self.shared.lock().release(session, resource);
        if released {
            self.shared.released.notify_all();
            0
        } else {
            RELEASE_NOT_HELD
        }
    }

    fn end_session(&self, session: u64) {
        if self.shared.lock().release_session(session) {
            self.shared.released.notify_all();
        }
    }
}

/// One session on a [`MemoryResourceManager`].
///
/// Locks are owned by the session; dropping or closing it releases them.
#[derive(Debug)]
pub struct MemorySession {
    manager: MemoryResourceManager,
    id: u64,
    open: bool,
    pending_failures: VecDeque<ConnectionError>,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Close the session, dropping every lock it owns.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            self.manager.end_session(self.id);
        }
    }

    /// Make the next `execute` fail with `err` without touching lock state.
    pub fn fail_next(&mut self, err: ConnectionError) {
        self.pending_failures.push_back(err);
    }
}

impl Connection for MemorySession {
    fn execute(&mut self, command: &Command) -> Result<ResultSet, ConnectionError> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        if let Some(err) = self.pending_failures.pop_front() {
            return Err(err);
        }

        let resource = command.resource();
        let return_code = match command {
            Command::Acquire {
                mode,
                timeout,
                principal,
                ..
            } => {
                if resource.is_empty()
                    || resource.chars().count() > MAX_RESOURCE_LEN
                    || principal.is_empty()
                {
                    Some(AcquireStatus::CallError.code())
                } else {
                    Some(self.manager.get_applock(self.id, resource, *mode, *timeout))
                }
            }
            Command::Release { .. } => Some(self.manager.release_applock(self.id, resource)),
            Command::Probe { .. } => None,
        };

        Ok(ResultSet {
            return_code,
            rows: self.manager.catalog(resource),
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acquire(resource: &str, mode: LockMode, timeout: LockTimeout) -> Command {
        Command::Acquire {
            resource: resource.to_string(),
            mode,
            timeout,
            principal: "public".to_string(),
        }
    }

    fn release(resource: &str) -> Command {
        Command::Release {
            resource: resource.to_string(),
            principal: "public".to_string(),
        }
    }

    fn probe(resource: &str) -> Command {
        Command::Probe {
            resource: resource.to_string(),
        }
    }

    #[test]
    fn compatibility_matrix_matches_application_locks() {
        use LockMode::*;
        let expected = [
            (IntentShared, [true, true, true, true, false]),
            (Shared, [true, true, true, false, false]),
            (Update, [true, true, false, false, false]),
            (IntentExclusive, [true, false, false, true, false]),
            (Exclusive, [false, false, false, false, false]),
        ];
        let order = [IntentShared, Shared, Update, IntentExclusive, Exclusive];

        for (requested, row) in expected {
            for (granted, want) in order.iter().zip(row) {
                assert_eq!(
                    modes_compatible(requested, *granted),
                    want,
                    "{} vs {}",
                    requested,
                    granted
                );
            }
        }
    }

    #[test]
    fn acquire_reports_granted_and_catalog_row() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();

        let result = session
            .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        assert_eq!(result.return_code, Some(0));
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0].resource_type, "APPLICATION");
        assert_eq!(result.rows[0].request_mode, "X");
        assert!(result.rows[0].resource_description.starts_with("0:[jobs]:("));
    }

    #[test]
    fn conflicting_request_times_out_immediately() {
        let manager = MemoryResourceManager::new();
        let mut first = manager.connect();
        let mut second = manager.connect();

        first
            .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();
        let result = second
            .execute(&acquire("jobs", LockMode::Shared, LockTimeout::Millis(0)))
            .unwrap();

        assert_eq!(result.return_code, Some(-1));
        assert_eq!(result.row_count(), 1, "only the first session's grant");
    }

    #[test]
    fn shared_requests_coexist() {
        let manager = MemoryResourceManager::new();
        let mut first = manager.connect();
        let mut second = manager.connect();

        for session in [&mut first, &mut second] {
            let result = session
                .execute(&acquire("report", LockMode::Shared, LockTimeout::Millis(0)))
                .unwrap();
            assert_eq!(result.return_code, Some(0));
        }
        assert_eq!(manager.catalog("report").len(), 2);
    }

    #[test]
    fn same_session_is_reentrant_and_counted() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        let cmd = acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0));

        assert_eq!(session.execute(&cmd).unwrap().return_code, Some(0));
        assert_eq!(session.execute(&cmd).unwrap().return_code, Some(0));

        let after_one = session.execute(&release("jobs")).unwrap();
        assert_eq!(after_one.return_code, Some(0));
        assert_eq!(after_one.row_count(), 1);

        let after_two = session.execute(&release("jobs")).unwrap();
        assert_eq!(after_two.row_count(), 0);
    }

    #[test]
    fn releasing_unheld_lock_returns_error_code() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();

        let result = session.execute(&release("nothing")).unwrap();
        assert_eq!(result.return_code, Some(-999));
        assert!(result.rows.is_empty());
    }

    #[test]
    fn waiting_request_is_granted_after_release() {
        let manager = MemoryResourceManager::new();
        let mut holder = manager.connect();
        holder
            .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        let waiter_manager = manager.clone();
        let waiter = std::thread::spawn(move || {
            let mut session = waiter_manager.connect();
            let code = session
                .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(5_000)))
                .unwrap()
                .return_code;
            session.close();
            code
        });

        std::thread::sleep(Duration::from_millis(50));
        holder.execute(&release("jobs")).unwrap();

        assert_eq!(waiter.join().unwrap(), Some(1));
    }

    #[test]
    fn catalog_filter_does_not_match_longer_names() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        session
            .execute(&acquire("lock2", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        assert!(session.execute(&probe("lock")).unwrap().rows.is_empty());
        assert_eq!(session.execute(&probe("lock2")).unwrap().row_count(), 1);
    }

    #[test]
    fn catalog_filter_does_not_match_inside_another_name() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        session
            .execute(&acquire("a[b", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        assert!(session.execute(&probe("b")).unwrap().rows.is_empty());
        assert_eq!(session.execute(&probe("a[b")).unwrap().row_count(), 1);
    }

    #[test]
    fn catalog_truncates_long_names() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        let name = "n".repeat(40);
        session
            .execute(&acquire(&name, LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        let rows = manager.catalog(&name);
        assert_eq!(rows.len(), 1);
        assert!(
            rows[0]
                .resource_description
                .starts_with(&format!("0:[{}]:(", "n".repeat(32)))
        );
    }

    #[test]
    fn closing_session_releases_its_locks() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        session
            .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();

        session.close();

        assert!(!session.is_open());
        assert!(manager.catalog("jobs").is_empty());
        assert_eq!(
            session.execute(&probe("jobs")).unwrap_err(),
            ConnectionError::Closed
        );
    }

    #[test]
    fn dropping_session_releases_its_locks() {
        let manager = MemoryResourceManager::new();
        {
            let mut session = manager.connect();
            session
                .execute(&acquire("jobs", LockMode::Exclusive, LockTimeout::Millis(0)))
                .unwrap();
        }
        assert!(manager.catalog("jobs").is_empty());
    }

    #[test]
    fn injected_failure_applies_once() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        session.fail_next(ConnectionError::Statement("network reset".to_string()));

        assert!(session.execute(&probe("jobs")).is_err());
        assert!(session.execute(&probe("jobs")).is_ok());
    }

    #[test]
    fn overlong_resource_name_is_a_call_error() {
        let manager = MemoryResourceManager::new();
        let mut session = manager.connect();
        let name = "r".repeat(MAX_RESOURCE_LEN + 1);

        let result = session
            .execute(&acquire(&name, LockMode::Exclusive, LockTimeout::Millis(0)))
            .unwrap();
        assert_eq!(result.return_code, Some(-999));
    }
}
