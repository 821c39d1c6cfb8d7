use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::callsite::{BacktraceResolver, CallSiteResolver};
use crate::config::SpyConfig;
use crate::context::CallContext;
use crate::dialect::{Dialect, ValueFormatter};
use crate::error::SqlSpyError;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::router::{LogRouter, STATEMENT_WARNING, batch_report};
use crate::sink::{LogSink, TracingSink};
use crate::statement::PreparedStatementHandle;
use crate::timing::around;
use crate::types::BindValue;

/// Entry point for forwarding wrappers.
///
/// Owns the settings, the connection registry and the router. Wrappers keep an
/// `Arc<SqlSpy>` and report every call through it.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sql_spy::prelude::*;
///
/// # fn main() -> Result<(), SqlSpyError> {
/// let spy = Arc::new(SqlSpy::new(SpyConfig::from_env()?, Arc::new(TracingSink)));
/// let conn = spy.open_connection("rusqlite");
/// let stmt = spy.prepare(&conn, "select * from users where id = ?");
/// spy.bind(&stmt, 1, Some("Int"), &BindValue::Int(7))?;
/// assert_eq!(spy.dumped_sql(&stmt), "select * from users where id = 7");
/// spy.close_connection(&conn)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqlSpy {
    config: SpyConfig,
    registry: ConnectionRegistry,
    router: LogRouter,
}

impl SqlSpy {
    /// Build a spy that attributes calls through the live backtrace.
    #[must_use]
    pub fn new(config: SpyConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::with_resolver(config, sink, Arc::new(BacktraceResolver))
    }

    /// Build a spy with an explicit call-site resolver. Queued setup messages are logged here.
    #[must_use]
    pub fn with_resolver(
        mut config: SpyConfig,
        sink: Arc<dyn LogSink>,
        resolver: Arc<dyn CallSiteResolver>,
    ) -> Self {
        let router = LogRouter::new(&config, sink, resolver);
        for message in config.take_setup_messages() {
            router.debug(message);
        }
        Self {
            config,
            registry: ConnectionRegistry::new(),
            router,
        }
    }

    /// Settings from the environment, logging through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConfigError` if an enumerated setting is invalid.
    pub fn from_env() -> Result<Self, SqlSpyError> {
        Ok(Self::new(SpyConfig::from_env()?, Arc::new(TracingSink)))
    }

    #[must_use]
    pub fn config(&self) -> &SpyConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn router(&self) -> &LogRouter {
        &self.router
    }

    /// The configured dialect, or the one the driver name maps to.
    #[must_use]
    pub fn dialect_for(&self, driver_name: &str) -> Dialect {
        self.config
            .dialect
            .unwrap_or_else(|| Dialect::from_driver_name(driver_name))
    }

    /// Register a connection to a driver reporting `driver_name` and log the open.
    pub fn open_connection(&self, driver_name: &str) -> Arc<ConnectionHandle> {
        let dialect = self.dialect_for(driver_name);
        self.router
            .debug(format!("driver name is {driver_name}, using {dialect:?} dialect"));
        let handle = self.registry.open(dialect);
        self.router.connection_opened(handle.id(), &self.registry);
        handle
    }

    /// Remove a connection from the registry and log the close.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConnectionError` if the connection is not open.
    pub fn close_connection(&self, handle: &ConnectionHandle) -> Result<(), SqlSpyError> {
        match self.registry.close(handle.id()) {
            Ok(_) => {
                self.router.connection_closed(handle.id(), &self.registry);
                Ok(())
            }
            Err(err) => {
                self.router.diagnostic(err.to_string());
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn prepare(
        &self,
        connection: &Arc<ConnectionHandle>,
        template: impl Into<String>,
    ) -> PreparedStatementHandle {
        PreparedStatementHandle::new(Arc::clone(connection), template)
    }

    /// Format `value` in the statement's dialect and track it at `index` (1-based).
    ///
    /// A value the dialect cannot format is tracked as its raw text and the failure is
    /// logged on the setup channel.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ParameterError` if `index` is 0.
    pub fn bind(
        &self,
        statement: &PreparedStatementHandle,
        index: usize,
        type_hint: Option<&str>,
        value: &BindValue,
    ) -> Result<(), SqlSpyError> {
        let dialect = statement.connection().dialect();
        let (text, failure) = ValueFormatter::new(dialect, self.config.format).format(value);
        if let Some(err) = failure {
            self.router.diagnostic(format!(
                "parameter {index} could not be formatted, logging raw text: {err}"
            ));
        }
        statement.tracker().set(index, type_hint, text)
    }

    /// SQL to log for a prepared statement: reconstructed, or the bare template when
    /// parameter display is off.
    #[must_use]
    pub fn dumped_sql(&self, statement: &PreparedStatementHandle) -> String {
        if self.config.show_params {
            statement.reconstructed(self.config.dump_type_hints)
        } else {
            statement.template().to_string()
        }
    }

    /// SQL run through a plain statement, prefixed with the usage warning when enabled.
    #[must_use]
    pub fn statement_sql(&self, sql: &str) -> String {
        if self.config.statement_warn {
            format!("{STATEMENT_WARNING}{sql}")
        } else {
            sql.to_string()
        }
    }

    pub fn report_return(&self, ctx: &CallContext, return_msg: impl fmt::Display) {
        self.router.method_returned(ctx, &return_msg.to_string());
    }

    pub fn report_exception(
        &self,
        ctx: &CallContext,
        error: &dyn fmt::Display,
        sql: Option<&str>,
        elapsed: Option<Duration>,
    ) {
        self.router.exception_occurred(ctx, error, sql, elapsed);
    }

    /// Log `sql` as about to run. Pairs with [`SqlSpy::report_timing`] when the driver does
    /// its work after the call returns, as a lazily stepped cursor does.
    pub fn report_sql(&self, ctx: &CallContext, sql: &str) {
        self.router.sql_occurred(ctx, sql);
    }

    pub fn report_timing(&self, ctx: &CallContext, elapsed: Duration, sql: &str) {
        self.router.sql_timing_occurred(ctx, elapsed, sql);
    }

    /// Log `sql`, run `operation` timed, then log the timing or the failure.
    ///
    /// # Errors
    ///
    /// Returns whatever `operation` returned, unchanged.
    pub fn run_sql<T, E, F>(&self, ctx: &CallContext, sql: &str, operation: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.report_sql(ctx, sql);
        let (outcome, elapsed) = around(operation);
        match &outcome {
            Ok(_) => self.report_timing(ctx, elapsed, sql),
            Err(err) => self
                .router
                .exception_occurred(ctx, err, Some(sql), Some(elapsed)),
        }
        outcome
    }

    /// Queue the statement's current SQL for its next batch.
    pub fn add_batch(&self, statement: &PreparedStatementHandle) {
        statement.push_batch(self.dumped_sql(statement));
    }

    /// Drain the statement's batch into a `batching N statements:` report.
    #[must_use]
    pub fn batch_report(&self, statement: &PreparedStatementHandle) -> String {
        batch_report(&statement.take_batch())
    }

    /// Drain the registry, logging every connection that was never closed.
    pub fn shutdown(&self) -> Vec<Arc<ConnectionHandle>> {
        let leaked = self.registry.shutdown();
        for handle in &leaked {
            self.router.diagnostic(format!(
                "connection {} opened at {} was never closed",
                handle.id(),
                handle.opened_at().format("%F %T")
            ));
        }
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite::FixedFrames;
    use crate::sink::{Channel, RecordingSink, Severity};
    use crate::types::ObjectKind;

    fn spy(config: SpyConfig) -> (SqlSpy, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        let spy = SqlSpy::with_resolver(config, sink.clone(), Arc::new(FixedFrames::default()));
        (spy, sink)
    }

    #[test]
    fn prepared_sql_is_reconstructed_in_dialect() {
        let (spy, _) = spy(SpyConfig::default().with_dialect(Dialect::MySql));
        let conn = spy.open_connection("whatever");
        let stmt = spy.prepare(&conn, "insert into t values (?, ?)");
        spy.bind(&stmt, 1, None, &BindValue::Int(1)).unwrap();
        spy.bind(&stmt, 2, None, &"it's".into()).unwrap();
        assert_eq!(spy.dumped_sql(&stmt), "insert into t values (1, 'it''s')");
    }

    #[test]
    fn show_params_off_logs_template() {
        let (spy, _) = spy(SpyConfig::default().with_show_params(false));
        let conn = spy.open_connection("rusqlite");
        let stmt = spy.prepare(&conn, "select ?");
        spy.bind(&stmt, 1, None, &BindValue::Int(1)).unwrap();
        assert_eq!(spy.dumped_sql(&stmt), "select ?");
    }

    #[test]
    fn run_sql_returns_the_error_unchanged() {
        let (spy, sink) = spy(SpyConfig::default().with_max_line_length(0));
        let conn = spy.open_connection("rusqlite");
        let ctx = CallContext::new(ObjectKind::Statement, conn.id(), "execute");
        let out: Result<u32, String> = spy.run_sql(&ctx, "select 1", || Err("locked".to_string()));
        assert_eq!(out, Err("locked".to_string()));
        assert_eq!(sink.messages(Channel::SqlOnly)[0], "select 1");
        assert!(sink.messages(Channel::SqlTiming)[0].contains("FAILED! select 1 {FAILED after"));
    }

    #[test]
    fn close_twice_is_reported() {
        let (spy, sink) = spy(SpyConfig::default());
        let conn = spy.open_connection("rusqlite");
        spy.close_connection(&conn).unwrap();
        assert!(spy.close_connection(&conn).is_err());
        assert_eq!(sink.messages(Channel::Connection), vec![
            "1. Connection opened".to_string(),
            "1. Connection closed".to_string(),
        ]);
        assert_eq!(sink.messages(Channel::Setup).len(), 1);
    }

    #[test]
    fn unformattable_values_fall_back_and_are_logged() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        let (spy, sink) = spy(SpyConfig::default());
        let conn = spy.open_connection("rusqlite");
        let stmt = spy.prepare(&conn, "select ?");
        spy.bind(&stmt, 1, None, &BindValue::other(Broken)).unwrap();
        assert_eq!(spy.dumped_sql(&stmt), "select <unprintable value>");
        assert!(sink.messages(Channel::Setup)[0].starts_with("parameter 1 could not be formatted"));
    }

    #[test]
    fn batches_and_statement_warning() {
        let (spy, _) = spy(SpyConfig::default().with_statement_warn(true));
        let conn = spy.open_connection("rusqlite");
        let stmt = spy.prepare(&conn, "delete from t where id = ?");
        for id in [1, 2] {
            spy.bind(&stmt, 1, None, &BindValue::Int(id)).unwrap();
            spy.add_batch(&stmt);
        }
        assert_eq!(
            spy.batch_report(&stmt),
            "batching 2 statements:\n1:  delete from t where id = 1\n2:  delete from t where id = 2"
        );
        assert_eq!(
            spy.statement_sql("select 1"),
            "{WARNING: Statement used to run SQL} select 1"
        );
    }

    #[test]
    fn shutdown_reports_leaks() {
        let (spy, sink) = spy(SpyConfig::default());
        spy.open_connection("rusqlite");
        let leaked = spy.shutdown();
        assert_eq!(leaked.len(), 1);
        assert!(sink.messages(Channel::Setup)[0].contains("was never closed"));
    }
}
