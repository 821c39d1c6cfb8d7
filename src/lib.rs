//! Logs every SQL call made through a database client: the literal SQL with bound values
//! inlined, how long it took, and when connections open and close.
//!
//! Forwarding wrappers report through a [`SqlSpy`]; the `sqlite` feature ships one set of
//! wrappers over `rusqlite`. Output goes to a [`sink::LogSink`], by default `tracing`.

pub mod callsite;
pub mod config;
pub mod context;
pub mod dialect;
pub mod error;
pub mod params;
pub mod prelude;
pub mod reconstruct;
pub mod registry;
pub mod report;
pub mod router;
pub mod sink;
pub mod spy;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod statement;
pub mod timing;
pub mod types;

pub use config::SpyConfig;
pub use context::CallContext;
pub use error::SqlSpyError;
pub use spy::SqlSpy;
