//! Renders bound values as SQL literals a vendor's native client would accept.
//!
//! Each [`Dialect`] maps to one [`DialectFormatter`]. Vendors only override the value kinds
//! they render differently (mostly dates), and fall through to [`default`] for the rest.

use std::panic::{self, AssertUnwindSafe};

use clap::ValueEnum;
use serde::Serialize;

use crate::error::SqlSpyError;
use crate::types::BindValue;

pub mod default;
mod mysql;
mod oracle;
mod sqlserver;

pub use default::DefaultFormatter;
pub use mysql::MySqlFormatter;
pub use oracle::OracleFormatter;
pub use sqlserver::SqlServerFormatter;

/// Options shared by every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FormatOptions {
    /// Render booleans as `true`/`false` instead of `1`/`0`.
    pub boolean_as_true_false: bool,
}

/// Formats one bound value as SQL text. Implementations may fail; callers go through
/// [`ValueFormatter`], which never does.
pub trait DialectFormatter: Send + Sync {
    /// Format a value for display in reconstructed SQL.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::FormatError` if the value cannot be rendered.
    fn format_value(&self, value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError>;
}

/// SQL literal conventions of a database vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
pub enum Dialect {
    #[default]
    Default,
    Oracle,
    #[value(alias = "sqlserver", alias = "mssql")]
    SqlServer,
    #[value(alias = "mysql")]
    MySql,
}

static DEFAULT: DefaultFormatter = DefaultFormatter;
static ORACLE: OracleFormatter = OracleFormatter;
static SQLSERVER: SqlServerFormatter = SqlServerFormatter;
static MYSQL: MySqlFormatter = MySqlFormatter;

/// Driver names recognized when picking a dialect; anything else gets [`Dialect::Default`].
const DRIVER_TABLE: &[(&str, Dialect)] = &[
    ("oracle", Dialect::Oracle),
    ("sibyl", Dialect::Oracle),
    ("tiberius", Dialect::SqlServer),
    ("mssql", Dialect::SqlServer),
    ("sqlserver", Dialect::SqlServer),
    ("mysql", Dialect::MySql),
    ("mysql_async", Dialect::MySql),
    ("mariadb", Dialect::MySql),
];

impl Dialect {
    /// Pick a dialect from the name the real driver reports.
    #[must_use]
    pub fn from_driver_name(driver_name: &str) -> Self {
        let needle = driver_name.trim();
        DRIVER_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(needle))
            .map_or(Dialect::Default, |(_, dialect)| *dialect)
    }

    /// Parse a configured dialect name.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConfigError` if the name is not one of the known dialects.
    pub fn parse(value: &str) -> Result<Self, SqlSpyError> {
        <Dialect as ValueEnum>::from_str(value.trim(), true).map_err(|_| {
            SqlSpyError::ConfigError(format!(
                "dialect should be one of default, oracle, sql-server, my-sql. Was '{value}'."
            ))
        })
    }

    #[must_use]
    pub fn formatter(self) -> &'static dyn DialectFormatter {
        match self {
            Dialect::Default => &DEFAULT,
            Dialect::Oracle => &ORACLE,
            Dialect::SqlServer => &SQLSERVER,
            Dialect::MySql => &MYSQL,
        }
    }
}

/// A dialect plus options; the infallible entry point used when tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueFormatter {
    pub dialect: Dialect,
    pub opts: FormatOptions,
}

impl ValueFormatter {
    #[must_use]
    pub fn new(dialect: Dialect, opts: FormatOptions) -> Self {
        Self { dialect, opts }
    }

    /// Format a value, propagating any formatter failure.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::FormatError` if the dialect formatter fails or panics.
    pub fn try_format(&self, value: &BindValue) -> Result<String, SqlSpyError> {
        let formatter = self.dialect.formatter();
        let opts = self.opts;
        panic::catch_unwind(AssertUnwindSafe(|| formatter.format_value(value, opts)))
            .unwrap_or_else(|_| {
                Err(SqlSpyError::FormatError(format!(
                    "{:?} formatter panicked on a {} value",
                    self.dialect,
                    value.type_name()
                )))
            })
    }

    /// Format a value, falling back to its raw text on failure.
    ///
    /// The second element carries the failure so the caller can log it.
    #[must_use]
    pub fn format(&self, value: &BindValue) -> (String, Option<SqlSpyError>) {
        match self.try_format(value) {
            Ok(text) => (text, None),
            Err(err) => (value.raw_text(), Some(err)),
        }
    }
}

/// Double every single quote; no other escaping.
#[must_use]
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    for c in input.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out
}

/// Wrap text in single quotes, escaping embedded quotes.
#[must_use]
pub fn quote(input: &str) -> String {
    format!("'{}'", escape_string(input))
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn sample_timestamp() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 12, 31)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 150)
            .unwrap()
    }

    fn render(dialect: Dialect, value: BindValue) -> String {
        ValueFormatter::new(dialect, FormatOptions::default())
            .try_format(&value)
            .unwrap()
    }

    #[test]
    fn driver_table_lookup() {
        assert_eq!(Dialect::from_driver_name("Tiberius"), Dialect::SqlServer);
        assert_eq!(Dialect::from_driver_name("oracle"), Dialect::Oracle);
        assert_eq!(Dialect::from_driver_name("mysql_async"), Dialect::MySql);
        assert_eq!(Dialect::from_driver_name("rusqlite"), Dialect::Default);
        assert_eq!(Dialect::from_driver_name(""), Dialect::Default);
    }

    #[test]
    fn parse_rejects_unknown_dialect() {
        assert_eq!(Dialect::parse("ORACLE").unwrap(), Dialect::Oracle);
        assert_eq!(Dialect::parse("sql-server").unwrap(), Dialect::SqlServer);
        assert!(matches!(
            Dialect::parse("db2"),
            Err(SqlSpyError::ConfigError(_))
        ));
    }

    #[test]
    fn strings_are_quoted_with_doubled_ticks() {
        assert_eq!(render(Dialect::Default, "O'Brien".into()), "'O''Brien'");
        assert_eq!(render(Dialect::MySql, "it''s".into()), "'it''''s'");
        assert_eq!(render(Dialect::Default, "back\\slash".into()), "'back\\slash'");
    }

    #[test]
    fn unquoting_recovers_the_input() {
        let input = "a 'quoted' ''value''";
        let rendered = render(Dialect::Default, input.into());
        let inner = &rendered[1..rendered.len() - 1];
        assert_eq!(inner.replace("''", "'"), input);
    }

    #[test]
    fn null_and_scalars() {
        assert_eq!(render(Dialect::Oracle, BindValue::Null), "NULL");
        assert_eq!(render(Dialect::SqlServer, BindValue::Int(-7)), "-7");
        assert_eq!(render(Dialect::Default, BindValue::Float(1.5)), "1.5");
    }

    #[test]
    fn booleans_follow_the_global_flag() {
        let digits = ValueFormatter::new(Dialect::Default, FormatOptions::default());
        let words = ValueFormatter::new(
            Dialect::Default,
            FormatOptions {
                boolean_as_true_false: true,
            },
        );
        assert_eq!(digits.try_format(&BindValue::Bool(true)).unwrap(), "1");
        assert_eq!(digits.try_format(&BindValue::Bool(false)).unwrap(), "0");
        assert_eq!(words.try_format(&BindValue::Bool(true)).unwrap(), "true");
        assert_eq!(words.try_format(&BindValue::Bool(false)).unwrap(), "false");
    }

    #[test]
    fn default_dates() {
        let ts = sample_timestamp();
        assert_eq!(
            render(Dialect::Default, BindValue::Timestamp(ts)),
            "'12/31/2011 23:59:59.150'"
        );
        assert_eq!(
            render(Dialect::Default, BindValue::Date(ts.date())),
            "'12/31/2011 00:00:00.000'"
        );
        assert_eq!(
            render(Dialect::Default, BindValue::Time(ts.time())),
            "'01/01/1970 23:59:59.150'"
        );
    }

    #[test]
    fn oracle_dates_use_to_date() {
        assert_eq!(
            render(Dialect::Oracle, BindValue::Timestamp(sample_timestamp())),
            "to_date('12/31/2011 23:59:59.150', 'mm/dd/yyyy hh24:mi:ss.ff3')"
        );
        assert_eq!(render(Dialect::Oracle, "x".into()), "'x'");
    }

    #[test]
    fn sqlserver_dates() {
        let ts = sample_timestamp();
        assert_eq!(render(Dialect::SqlServer, BindValue::Date(ts.date())), "'12/31/2011'");
        assert_eq!(
            render(Dialect::SqlServer, BindValue::Timestamp(ts)),
            "'12/31/2011 23:59:59.150'"
        );
    }

    #[test]
    fn mysql_dates() {
        let ts = sample_timestamp();
        assert_eq!(render(Dialect::MySql, BindValue::Time(ts.time())), "'23:59:59'");
        assert_eq!(render(Dialect::MySql, BindValue::Date(ts.date())), "'2011-12-31'");
        assert_eq!(
            render(Dialect::MySql, BindValue::Timestamp(ts)),
            "'2011-12-31 23:59:59'"
        );
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(render(Dialect::MySql, BindValue::Time(noon)), "'12:00:00'");
    }

    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    struct Panicky;

    impl fmt::Display for Panicky {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("display blew up")
        }
    }

    #[test]
    fn failures_fall_back_to_raw_text() {
        let formatter = ValueFormatter::default();

        let (text, err) = formatter.format(&BindValue::other(Broken));
        assert_eq!(text, "<unprintable value>");
        assert!(matches!(err, Some(SqlSpyError::FormatError(_))));

        let (text, err) = formatter.format(&BindValue::other(Panicky));
        assert_eq!(text, "<unprintable value>");
        assert!(err.is_some());

        let (text, err) = formatter.format(&BindValue::other("plain"));
        assert_eq!(text, "plain");
        assert!(err.is_none());
    }
}
