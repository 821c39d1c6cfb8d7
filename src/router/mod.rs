//! Turns intercepted events into log lines and hands them to the sink.
//!
//! The router is the only component that talks to a [`LogSink`]. It picks the channel,
//! renders the message at the detail level the channel currently accepts, and applies the
//! statement-type filter and SQL layout. A sink that panics is contained here.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::callsite::{CallSiteResolver, render_debug_info};
use crate::config::{SpyConfig, SqlTypeFilter};
use crate::context::CallContext;
use crate::registry::ConnectionRegistry;
use crate::sink::{Channel, LogEvent, LogSink, Severity};
use crate::timing::{TimingThresholds, elapsed_in};
use crate::types::{ObjectKind, TimingUnit};

mod format;

pub use format::{STATEMENT_WARNING, SqlLayout, batch_report, should_dump};

pub struct LogRouter {
    sink: Arc<dyn LogSink>,
    resolver: Arc<dyn CallSiteResolver>,
    layout: SqlLayout,
    filter: SqlTypeFilter,
    thresholds: TimingThresholds,
    timing_unit: TimingUnit,
    full_debug_stack_trace: bool,
    debug_stack_prefix: Option<String>,
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRouter")
            .field("layout", &self.layout)
            .field("filter", &self.filter)
            .field("thresholds", &self.thresholds)
            .field("timing_unit", &self.timing_unit)
            .finish_non_exhaustive()
    }
}

impl LogRouter {
    #[must_use]
    pub fn new(
        config: &SpyConfig,
        sink: Arc<dyn LogSink>,
        resolver: Arc<dyn CallSiteResolver>,
    ) -> Self {
        Self {
            sink,
            resolver,
            layout: SqlLayout::from_config(config),
            filter: config.filter,
            thresholds: config.thresholds,
            timing_unit: config.timing_unit,
            full_debug_stack_trace: config.full_debug_stack_trace,
            debug_stack_prefix: config.debug_stack_prefix.clone(),
        }
    }

    /// Whether the sink accepts `severity` on `channel`. A panicking sink counts as "no".
    #[must_use]
    pub fn enabled(&self, channel: Channel, severity: Severity) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| self.sink.enabled(channel, severity)))
            .unwrap_or(false)
    }

    fn emit(&self, event: LogEvent) {
        // a failing sink must never reach the caller
        let _ = panic::catch_unwind(AssertUnwindSafe(|| self.sink.log(&event)));
    }

    fn emit_at(&self, channel: Channel, severity: Severity, message: String) {
        self.emit(LogEvent::new(channel, severity, message));
    }

    /// Attribution text for detailed lines; captures the stack, so only call it when needed.
    fn debug_info(&self) -> String {
        let frames = self.resolver.capture();
        render_debug_info(
            &frames,
            self.full_debug_stack_trace,
            self.debug_stack_prefix.as_deref(),
        )
    }

    fn elapsed_text(&self, elapsed: Duration) -> String {
        format!(
            "{} {}",
            elapsed_in(elapsed, self.timing_unit),
            self.timing_unit.suffix()
        )
    }

    /// Whether `sql` would appear on the SQL channels at all.
    #[must_use]
    pub fn should_dump(&self, sql: &str) -> bool {
        should_dump(&self.filter, sql)
    }

    /// A wrapped call failed.
    ///
    /// Without SQL the header goes to the audit, sql-only and sql-timing channels as is.
    /// With SQL each channel gets its own rendering, detailed when it accepts debug.
    /// The statement-type filter does not apply.
    pub fn exception_occurred(
        &self,
        ctx: &CallContext,
        error: &dyn fmt::Display,
        sql: Option<&str>,
        elapsed: Option<Duration>,
    ) {
        let header = ctx.header();
        let failure = |channel: Channel, message: String| {
            self.emit(LogEvent::new(channel, Severity::Error, message).with_error(error));
        };

        let Some(sql) = sql else {
            failure(Channel::Audit, header.clone());
            failure(Channel::SqlOnly, header.clone());
            failure(Channel::SqlTiming, header);
            return;
        };

        failure(Channel::Audit, format!("{header} {sql}"));

        if self.enabled(Channel::SqlOnly, Severity::Debug) {
            failure(
                Channel::SqlOnly,
                format!("{}\n{}. {sql}", self.debug_info(), ctx.connection_id),
            );
        } else {
            failure(Channel::SqlOnly, format!("{header} {sql}"));
        }

        let failed_after = elapsed
            .map(|e| format!(" {{FAILED after {}}}", self.elapsed_text(e)))
            .unwrap_or_default();
        if self.enabled(Channel::SqlTiming, Severity::Debug) {
            failure(
                Channel::SqlTiming,
                format!(
                    "{}\n{}. {sql}{failed_after}",
                    self.debug_info(),
                    ctx.connection_id
                ),
            );
        } else {
            failure(
                Channel::SqlTiming,
                format!("{header} FAILED! {sql}{failed_after}"),
            );
        }
    }

    /// A wrapped call returned. Cursor calls go to the resultset channel, the rest to audit.
    pub fn method_returned(&self, ctx: &CallContext, return_msg: &str) {
        let channel = match ctx.kind {
            ObjectKind::ResultSet => Channel::ResultSet,
            _ => Channel::Audit,
        };
        if !self.enabled(channel, Severity::Info) {
            return;
        }
        let header = format!("{} returned {return_msg}", ctx.header());
        if self.enabled(channel, Severity::Debug) {
            self.emit_at(
                channel,
                Severity::Debug,
                format!("{header} {}", self.debug_info()),
            );
        } else {
            self.emit_at(channel, Severity::Info, header);
        }
    }

    /// SQL is about to run.
    pub fn sql_occurred(&self, ctx: &CallContext, sql: &str) {
        if !self.should_dump(sql) {
            return;
        }
        let sql = self.layout.apply(sql);
        if self.enabled(Channel::SqlOnly, Severity::Debug) {
            self.emit_at(
                Channel::SqlOnly,
                Severity::Debug,
                format!("{}\n{}. {sql}", self.debug_info(), ctx.connection_id),
            );
        } else if self.enabled(Channel::SqlOnly, Severity::Info) {
            self.emit_at(Channel::SqlOnly, Severity::Info, sql);
        }
    }

    /// SQL finished running after `elapsed`.
    ///
    /// Crossing the error or warn threshold escalates the line; otherwise it is logged at
    /// debug with attribution or at info without.
    pub fn sql_timing_occurred(&self, ctx: &CallContext, elapsed: Duration, sql: &str) {
        if !self.enabled(Channel::SqlTiming, Severity::Error) || !self.should_dump(sql) {
            return;
        }
        let accepts_debug = self.enabled(Channel::SqlTiming, Severity::Debug);
        let severity = self.thresholds.classify(elapsed, accepts_debug);
        let detailed = match severity {
            Severity::Error | Severity::Debug => true,
            Severity::Warn if self.enabled(Channel::SqlTiming, Severity::Warn) => true,
            Severity::Info if self.enabled(Channel::SqlTiming, Severity::Info) => false,
            _ => return,
        };
        let dump = self.timing_dump(ctx, elapsed, sql, detailed);
        self.emit_at(Channel::SqlTiming, severity, dump);
    }

    fn timing_dump(
        &self,
        ctx: &CallContext,
        elapsed: Duration,
        sql: &str,
        detailed: bool,
    ) -> String {
        let mut out = String::new();
        if detailed {
            out.push_str(&self.debug_info());
            out.push('\n');
            out.push_str(&format!("{}. ", ctx.connection_id));
        }
        out.push_str(&self.layout.apply(sql));
        out.push_str(&format!(" {{executed in {}}}", self.elapsed_text(elapsed)));
        out
    }

    pub fn connection_opened(&self, id: u64, registry: &ConnectionRegistry) {
        self.connection_event(id, "opened", registry);
    }

    pub fn connection_closed(&self, id: u64, registry: &ConnectionRegistry) {
        self.connection_event(id, "closed", registry);
    }

    fn connection_event(&self, id: u64, what: &str, registry: &ConnectionRegistry) {
        if self.enabled(Channel::Connection, Severity::Debug) {
            self.emit_at(
                Channel::Connection,
                Severity::Info,
                format!("{id}. Connection {what} {}", self.debug_info()),
            );
            self.emit_at(
                Channel::Connection,
                Severity::Debug,
                registry.snapshot().to_string(),
            );
        } else {
            self.emit_at(Channel::Connection, Severity::Info, format!("{id}. Connection {what}"));
        }
    }

    /// Setup or administrative message.
    pub fn debug(&self, message: impl Into<String>) {
        self.emit_at(Channel::Setup, Severity::Debug, message.into());
    }

    /// Internal problem worth surfacing, e.g. a value that could not be formatted.
    pub fn diagnostic(&self, message: impl Into<String>) {
        self.emit_at(Channel::Setup, Severity::Warn, message.into());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::callsite::{FixedFrames, StackFrame};
    use crate::dialect::Dialect;
    use crate::sink::RecordingSink;

    fn frames() -> FixedFrames {
        FixedFrames(vec![
            StackFrame::new("sql_spy::spy::SqlSpy::run_sql"),
            StackFrame::new("app::orders::save").at("src/orders.rs", 7),
        ])
    }

    fn router(config: &SpyConfig, sink: &Arc<RecordingSink>) -> LogRouter {
        LogRouter::new(config, sink.clone(), Arc::new(frames()))
    }

    fn ctx() -> CallContext {
        CallContext::new(ObjectKind::PreparedStatement, 3, "executeUpdate")
    }

    #[test]
    fn sql_only_info_is_plain() {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        router(&SpyConfig::default(), &sink).sql_occurred(&ctx(), "  select 1  ");
        assert_eq!(sink.messages(Channel::SqlOnly), vec!["select 1 ".to_string()]);
    }

    #[test]
    fn sql_only_debug_carries_attribution() {
        let sink = Arc::new(RecordingSink::new(Severity::Debug));
        let config = SpyConfig::default().with_max_line_length(0);
        router(&config, &sink).sql_occurred(&ctx(), "select 1");
        assert_eq!(
            sink.messages(Channel::SqlOnly),
            vec![" app::orders::save(src/orders.rs:7)\n3. select 1".to_string()]
        );
    }

    #[test]
    fn timing_escalates_at_threshold() {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        let config = SpyConfig::default()
            .with_max_line_length(0)
            .with_thresholds(TimingThresholds::new(Some(100), Some(1000)));
        let router = router(&config, &sink);

        router.sql_timing_occurred(&ctx(), Duration::from_millis(99), "select 1");
        router.sql_timing_occurred(&ctx(), Duration::from_millis(100), "select 2");
        router.sql_timing_occurred(&ctx(), Duration::from_millis(1000), "select 3");

        let events = sink.events();
        assert_eq!(events[0].severity, Severity::Info);
        assert_eq!(events[0].message, "select 1 {executed in 99 msec}");
        assert_eq!(events[1].severity, Severity::Warn);
        assert!(events[1].message.ends_with("3. select 2 {executed in 100 msec}"));
        assert_eq!(events[2].severity, Severity::Error);
    }

    #[test]
    fn timing_channel_off_logs_nothing() {
        let sink = Arc::new(
            RecordingSink::new(Severity::Debug).with_channel(Channel::SqlTiming, None),
        );
        router(&SpyConfig::default(), &sink).sql_timing_occurred(
            &ctx(),
            Duration::ZERO,
            "select 1",
        );
        assert!(sink.messages(Channel::SqlTiming).is_empty());
    }

    #[test]
    fn nanos_unit() {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        let config = SpyConfig::default()
            .with_max_line_length(0)
            .with_timing_unit(TimingUnit::Nanos);
        router(&config, &sink).sql_timing_occurred(&ctx(), Duration::from_micros(3), "select 1");
        assert_eq!(
            sink.messages(Channel::SqlTiming),
            vec!["select 1 {executed in 3000 nanoSec}".to_string()]
        );
    }

    #[test]
    fn exceptions_ignore_the_filter() {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        let config = SpyConfig::default().with_max_line_length(0).with_filter(SqlTypeFilter {
            update: false,
            ..SqlTypeFilter::default()
        });
        let router = router(&config, &sink);
        let sql = "update t set a = 1";
        router.sql_occurred(&ctx(), sql);
        let elapsed = Some(Duration::from_millis(4));
        router.exception_occurred(&ctx(), &"disk I/O error", Some(sql), elapsed);

        assert_eq!(
            sink.messages(Channel::SqlOnly),
            vec!["3. PreparedStatement.executeUpdate() update t set a = 1".to_string()]
        );
        assert_eq!(
            sink.messages(Channel::SqlTiming),
            vec![
                "3. PreparedStatement.executeUpdate() FAILED! update t set a = 1 \
                 {FAILED after 4 msec}"
                    .to_string()
            ]
        );
        let audit = sink.events().into_iter().find(|e| e.channel == Channel::Audit).unwrap();
        assert_eq!(audit.error.as_deref(), Some("disk I/O error"));
    }

    #[test]
    fn exception_without_sql_goes_to_three_channels() {
        let sink = Arc::new(RecordingSink::new(Severity::Error));
        router(&SpyConfig::default(), &sink).exception_occurred(&ctx(), &"boom", None, None);
        let channels: Vec<Channel> = sink.events().iter().map(|e| e.channel).collect();
        assert_eq!(channels, vec![Channel::Audit, Channel::SqlOnly, Channel::SqlTiming]);
    }

    #[test]
    fn returns_route_by_kind() {
        let sink = Arc::new(RecordingSink::new(Severity::Info));
        let router = router(&SpyConfig::default(), &sink);
        router.method_returned(&CallContext::new(ObjectKind::ResultSet, 1, "next"), "true");
        router.method_returned(&CallContext::new(ObjectKind::Connection, 1, "close"), "");
        assert_eq!(
            sink.messages(Channel::ResultSet),
            vec!["1. ResultSet.next() returned true".to_string()]
        );
        assert_eq!(
            sink.messages(Channel::Audit),
            vec!["1. Connection.close() returned ".to_string()]
        );
    }

    #[test]
    fn connection_events_dump_open_set_at_debug() {
        let registry = ConnectionRegistry::new();
        let sink = Arc::new(RecordingSink::new(Severity::Debug));
        let router = router(&SpyConfig::default(), &sink);
        let handle = registry.open(Dialect::Default);
        router.connection_opened(handle.id(), &registry);
        assert_eq!(sink.messages(Channel::Connection), vec![
            "1. Connection opened  app::orders::save(src/orders.rs:7)".to_string(),
            "open connections:  1 (1)".to_string(),
        ]);
    }

    struct PanickingSink;

    impl LogSink for PanickingSink {
        fn enabled(&self, _channel: Channel, _severity: Severity) -> bool {
            true
        }

        fn log(&self, _event: &LogEvent) {
            panic!("sink unavailable");
        }
    }

    #[test]
    fn sink_panics_are_contained() {
        let router =
            LogRouter::new(&SpyConfig::default(), Arc::new(PanickingSink), Arc::new(frames()));
        router.sql_occurred(&ctx(), "select 1");
        router.exception_occurred(&ctx(), &"boom", Some("select 1"), None);
    }
}
