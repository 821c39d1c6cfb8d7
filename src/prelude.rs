//! Convenient imports for common functionality.
//!
//! This module re-exports the types a wrapper or an application needs to set up a spy
//! and report calls through it.

pub use crate::callsite::{BacktraceResolver, CallSiteResolver, FixedFrames, StackFrame};
pub use crate::config::{SpyConfig, SqlTypeFilter};
pub use crate::context::CallContext;
pub use crate::dialect::{Dialect, FormatOptions, ValueFormatter};
pub use crate::error::SqlSpyError;
pub use crate::params::BindParameterTracker;
pub use crate::reconstruct::reconstruct;
pub use crate::registry::{ConnectionHandle, ConnectionRegistry, OpenConnections};
pub use crate::report::{ProfileReport, ReportOptions};
pub use crate::sink::{Channel, LogEvent, LogSink, RecordingSink, Severity, TracingSink};
pub use crate::spy::SqlSpy;
pub use crate::statement::PreparedStatementHandle;
pub use crate::timing::TimingThresholds;
pub use crate::types::{BindValue, ObjectKind, TimingUnit};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SpyConnection, SpyRows, SpyStatement};
