use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use super::DRIVER_NAME;
use super::statement::SpyStatement;
use crate::context::CallContext;
use crate::error::SqlSpyError;
use crate::registry::ConnectionHandle;
use crate::spy::SqlSpy;
use crate::types::ObjectKind;

/// A `rusqlite` connection whose calls are logged through a [`SqlSpy`].
///
/// The connection is registered when wrapped and unregistered exactly once, by
/// [`SpyConnection::close`] or on drop.
#[derive(Debug)]
pub struct SpyConnection {
    conn: Connection,
    handle: Arc<ConnectionHandle>,
    spy: Arc<SqlSpy>,
    closed: bool,
}

impl SpyConnection {
    /// # Errors
    ///
    /// Returns the driver's error if the database cannot be opened.
    pub fn open_in_memory(spy: Arc<SqlSpy>) -> Result<Self, rusqlite::Error> {
        Ok(Self::wrap(spy, Connection::open_in_memory()?))
    }

    /// # Errors
    ///
    /// Returns the driver's error if the database cannot be opened.
    pub fn open(spy: Arc<SqlSpy>, path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        Ok(Self::wrap(spy, Connection::open(path)?))
    }

    /// Take over an already open connection.
    #[must_use]
    pub fn wrap(spy: Arc<SqlSpy>, conn: Connection) -> Self {
        let handle = spy.open_connection(DRIVER_NAME);
        Self {
            conn,
            handle,
            spy,
            closed: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// The unwrapped connection; calls made on it are not logged.
    #[must_use]
    pub fn inner(&self) -> &Connection {
        &self.conn
    }

    fn context(&self, kind: ObjectKind, method: &str) -> CallContext {
        CallContext::new(kind, self.id(), method)
    }

    /// Run one SQL statement without parameters, returning the changed row count.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn execute(&self, sql: &str) -> Result<usize, rusqlite::Error> {
        let ctx = self.context(ObjectKind::Statement, "executeUpdate").arg(sql);
        let logged = self.spy.statement_sql(sql);
        let changed = self.spy.run_sql(&ctx, &logged, || self.conn.execute(sql, []))?;
        self.spy.report_return(&ctx, changed);
        Ok(changed)
    }

    /// Run several `;`-separated statements.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn execute_batch(&self, sql: &str) -> Result<(), rusqlite::Error> {
        let ctx = self.context(ObjectKind::Statement, "execute").arg(sql);
        let logged = self.spy.statement_sql(sql);
        self.spy
            .run_sql(&ctx, &logged, || self.conn.execute_batch(sql))?;
        self.spy.report_return(&ctx, "");
        Ok(())
    }

    /// Prepare a statement whose parameters are tracked for logging.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn prepare(&self, sql: &str) -> Result<SpyStatement<'_>, rusqlite::Error> {
        let ctx = self.context(ObjectKind::Connection, "prepareStatement").arg(sql);
        match self.conn.prepare(sql) {
            Ok(stmt) => {
                let handle = self.spy.prepare(&self.handle, sql);
                self.spy.report_return(&ctx, "PreparedStatement");
                Ok(SpyStatement::new(stmt, handle, Arc::clone(&self.spy)))
            }
            Err(err) => {
                self.spy.report_exception(&ctx, &err, Some(sql), None);
                Err(err)
            }
        }
    }

    /// Close the connection and unregister it.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConnectionError` if the registry no longer knows the connection.
    pub fn close(mut self) -> Result<(), SqlSpyError> {
        self.closed = true;
        let ctx = self.context(ObjectKind::Connection, "close");
        self.spy.close_connection(&self.handle)?;
        self.spy.report_return(&ctx, "");
        Ok(())
    }
}

impl Drop for SpyConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            // already logged by the spy if it fails
            let _ = self.spy.close_connection(&self.handle);
        }
    }
}
