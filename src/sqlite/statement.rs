use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::bind_value_to_sqlite_value;
use super::rows::SpyRows;
use crate::context::CallContext;
use crate::spy::SqlSpy;
use crate::statement::PreparedStatementHandle;
use crate::types::{BindValue, ObjectKind};

/// A prepared `rusqlite` statement whose bound values are tracked for logging.
pub struct SpyStatement<'conn> {
    stmt: Statement<'conn>,
    handle: PreparedStatementHandle,
    spy: Arc<SqlSpy>,
    /// Driver values bound since the last clear, slot 0 = parameter 1
    current: Vec<Option<Value>>,
    pending: Vec<Vec<Option<Value>>>,
}

impl<'conn> SpyStatement<'conn> {
    pub(crate) fn new(
        stmt: Statement<'conn>,
        handle: PreparedStatementHandle,
        spy: Arc<SqlSpy>,
    ) -> Self {
        Self {
            stmt,
            handle,
            spy,
            current: Vec::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.handle.template()
    }

    #[must_use]
    pub fn handle(&self) -> &PreparedStatementHandle {
        &self.handle
    }

    /// The SQL as it would be logged right now.
    #[must_use]
    pub fn dumped_sql(&self) -> String {
        self.spy.dumped_sql(&self.handle)
    }

    fn context(&self, method: &str) -> CallContext {
        CallContext::new(ObjectKind::PreparedStatement, self.handle.connection_id(), method)
    }

    /// Bind `value` to parameter `index` (1-based) and track its formatted text.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged, e.g. for an index out of range.
    pub fn bind(
        &mut self,
        index: usize,
        value: impl Into<BindValue>,
    ) -> Result<(), rusqlite::Error> {
        let value = value.into();
        let ctx = self
            .context(&format!("set{}", value.type_name()))
            .arg(index)
            .arg(value.raw_text());
        let driver_value = bind_value_to_sqlite_value(&value);

        if let Err(err) = self.stmt.raw_bind_parameter(index, &driver_value) {
            self.spy.report_exception(&ctx, &err, None, None);
            return Err(err);
        }
        if let Err(err) = self.spy.bind(&self.handle, index, Some(value.type_name()), &value) {
            self.spy.router().diagnostic(err.to_string());
        }
        if let Some(slot) = index.checked_sub(1) {
            if slot >= self.current.len() {
                self.current.resize(slot + 1, None);
            }
            self.current[slot] = Some(driver_value);
        }
        self.spy.report_return(&ctx, "");
        Ok(())
    }

    /// Forget every bound value.
    pub fn clear_parameters(&mut self) {
        self.stmt.clear_bindings();
        self.handle.tracker().clear();
        self.current.clear();
        self.spy.report_return(&self.context("clearParameters"), "");
    }

    /// Run the statement, returning the changed row count.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn execute(&mut self) -> Result<usize, rusqlite::Error> {
        let ctx = self.context("executeUpdate");
        let sql = self.spy.dumped_sql(&self.handle);
        let stmt = &mut self.stmt;
        let changed = self.spy.run_sql(&ctx, &sql, || stmt.raw_execute())?;
        self.spy.report_return(&ctx, changed);
        Ok(changed)
    }

    /// Run the statement as a query; rows are stepped through [`SpyRows::next`], which also
    /// carries the query's timing.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn query(&mut self) -> Result<SpyRows<'_>, rusqlite::Error> {
        let ctx = self.context("executeQuery");
        let sql = self.spy.dumped_sql(&self.handle);
        self.spy.report_sql(&ctx, &sql);
        let rows = self.stmt.raw_query();
        self.spy.report_return(&ctx, "ResultSet");
        Ok(SpyRows::new(rows, Arc::clone(&self.spy), ctx, sql))
    }

    /// Queue the current parameter set for [`SpyStatement::execute_batch`].
    pub fn add_batch(&mut self) {
        self.spy.add_batch(&self.handle);
        self.pending.push(self.current.clone());
        self.spy.report_return(&self.context("addBatch"), "");
    }

    /// Run every queued parameter set, returning the changed row count of each.
    ///
    /// # Errors
    ///
    /// Returns the first driver error; the remaining sets are not run.
    pub fn execute_batch(&mut self) -> Result<Vec<usize>, rusqlite::Error> {
        let ctx = self.context("executeBatch");
        let report = self.spy.batch_report(&self.handle);
        let batch = std::mem::take(&mut self.pending);
        let stmt = &mut self.stmt;
        let counts = self.spy.run_sql(&ctx, &report, || {
            let mut counts = Vec::with_capacity(batch.len());
            for values in &batch {
                stmt.clear_bindings();
                for (slot, value) in values.iter().enumerate() {
                    if let Some(value) = value {
                        stmt.raw_bind_parameter(slot + 1, value)?;
                    }
                }
                counts.push(stmt.raw_execute()?);
            }
            Ok::<_, rusqlite::Error>(counts)
        })?;
        self.spy.report_return(&ctx, format!("{counts:?}"));
        Ok(counts)
    }
}
