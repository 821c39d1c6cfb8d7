// SQLite module - forwarding wrappers over rusqlite that report through a SqlSpy
//
// - connection: connection lifecycle, plain statements, prepare
// - statement: prepared statements with tracked parameters and batches
// - rows: result cursor
// - params: BindValue to rusqlite value conversion

pub mod connection;
pub mod params;
pub mod rows;
pub mod statement;

pub use connection::SpyConnection;
pub use params::bind_value_to_sqlite_value;
pub use rows::SpyRows;
pub use statement::SpyStatement;

/// Driver name reported to the dialect table.
pub const DRIVER_NAME: &str = "rusqlite";
