use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use crate::dialect::Dialect;
use crate::error::SqlSpyError;

/// A logical connection known to the registry.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: u64,
    opened_at: DateTime<Local>,
    dialect: Dialect,
}

impl ConnectionHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn opened_at(&self) -> DateTime<Local> {
        self.opened_at
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    last_id: u64,
    open: BTreeMap<u64, Arc<ConnectionHandle>>,
}

/// Assigns connection ids and tracks which connections are open.
///
/// The id counter and the open set share one mutex, so an id is handed out and inserted in
/// the same critical section. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly opened connection.
    pub fn open(&self, dialect: Dialect) -> Arc<ConnectionHandle> {
        let mut state = self.lock();
        state.last_id += 1;
        let handle = Arc::new(ConnectionHandle {
            id: state.last_id,
            opened_at: Local::now(),
            dialect,
        });
        state.open.insert(handle.id, Arc::clone(&handle));
        handle
    }

    /// Remove a connection from the open set.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConnectionError` if `id` is not currently open, which covers
    /// both unknown ids and double closes.
    pub fn close(&self, id: u64) -> Result<Arc<ConnectionHandle>, SqlSpyError> {
        self.lock()
            .open
            .remove(&id)
            .ok_or_else(|| SqlSpyError::ConnectionError(format!("connection {id} is not open")))
    }

    #[must_use]
    pub fn is_open(&self, id: u64) -> bool {
        self.lock().open.contains_key(&id)
    }

    /// Sorted ids of the open connections, taken under the lock.
    #[must_use]
    pub fn snapshot(&self) -> OpenConnections {
        OpenConnections {
            ids: self.lock().open.keys().copied().collect(),
        }
    }

    /// Drain the registry, returning whatever was still open.
    pub fn shutdown(&self) -> Vec<Arc<ConnectionHandle>> {
        let open = std::mem::take(&mut self.lock().open);
        open.into_values().collect()
    }
}

/// Point-in-time view of the open set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpenConnections {
    ids: Vec<u64>,
}

impl OpenConnections {
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl fmt::Display for OpenConnections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ids.is_empty() {
            return f.write_str("open connections:  none");
        }
        f.write_str("open connections:  ")?;
        for id in &self.ids {
            write!(f, "{id} ")?;
        }
        write!(f, "({})", self.ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_not_reused() {
        let registry = ConnectionRegistry::new();
        let a = registry.open(Dialect::Default);
        let b = registry.open(Dialect::Default);
        assert_eq!((a.id(), b.id()), (1, 2));
        registry.close(a.id()).unwrap();
        assert_eq!(registry.open(Dialect::Oracle).id(), 3);
    }

    #[test]
    fn double_close_is_an_error() {
        let registry = ConnectionRegistry::new();
        let handle = registry.open(Dialect::Default);
        registry.close(handle.id()).unwrap();
        assert!(matches!(
            registry.close(handle.id()),
            Err(SqlSpyError::ConnectionError(_))
        ));
        assert!(registry.close(99).is_err());
    }

    #[test]
    fn dump_text() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.snapshot().to_string(), "open connections:  none");
        for _ in 0..3 {
            registry.open(Dialect::Default);
        }
        registry.close(2).unwrap();
        assert_eq!(registry.snapshot().to_string(), "open connections:  1 3 (2)");
    }

    #[test]
    fn shutdown_drains() {
        let registry = ConnectionRegistry::new();
        registry.open(Dialect::Default);
        registry.open(Dialect::MySql);
        let leaked = registry.shutdown();
        assert_eq!(leaked.len(), 2);
        assert!(registry.snapshot().is_empty());
    }
}
