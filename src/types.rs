use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::SqlSpyError;

/// Raw text of a value that could not be rendered.
pub const UNPRINTABLE: &str = "<unprintable value>";

/// A value bound to a prepared statement parameter, as seen by the formatter.
///
/// Wrappers convert whatever the driver accepts into one of these before handing it to
/// [`crate::SqlSpy::bind`]:
/// ```rust
/// use sql_spy::prelude::*;
///
/// let params = vec![
///     BindValue::Int(1),
///     BindValue::Text("alice".into()),
///     BindValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Clone)]
pub enum BindValue {
    /// SQL NULL
    Null,
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Date without a time of day
    Date(NaiveDate),
    /// Time of day without a date
    Time(NaiveTime),
    /// Date and time
    Timestamp(NaiveDateTime),
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Anything else; rendered through its `Display` impl, unquoted
    Other(Arc<dyn fmt::Display + Send + Sync>),
}

impl BindValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Wrap an arbitrary displayable value.
    pub fn other<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        BindValue::Other(Arc::new(value))
    }

    /// Plain textual form of the value, with no dialect quoting applied.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::FormatError` if an `Other` value's `Display` impl fails.
    pub fn try_raw_text(&self) -> Result<String, SqlSpyError> {
        let mut out = String::new();
        match self {
            BindValue::Null => out.push_str("null"),
            BindValue::Int(i) => write!(out, "{i}")?,
            BindValue::Float(f) => write!(out, "{f}")?,
            BindValue::Text(s) => out.push_str(s),
            BindValue::Bool(b) => write!(out, "{b}")?,
            BindValue::Date(d) => write!(out, "{}", d.format("%F"))?,
            BindValue::Time(t) => write!(out, "{}", t.format("%T%.f"))?,
            BindValue::Timestamp(dt) => write!(out, "{}", dt.format("%F %T%.f"))?,
            BindValue::Json(j) => write!(out, "{j}")?,
            BindValue::Blob(bytes) => write!(out, "<Blob of size {}>", bytes.len())?,
            BindValue::Other(v) => write!(out, "{v}")?,
        }
        Ok(out)
    }

    /// Plain textual form that cannot fail.
    ///
    /// An `Other` value whose `Display` impl errors or panics renders as
    /// `<unprintable value>`.
    #[must_use]
    pub fn raw_text(&self) -> String {
        panic::catch_unwind(AssertUnwindSafe(|| self.try_raw_text()))
            .ok()
            .and_then(Result::ok)
            .unwrap_or_else(|| UNPRINTABLE.to_string())
    }

    /// Short type label used for type hints and method-call rendering.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            BindValue::Null => "null",
            BindValue::Int(_) => "Int",
            BindValue::Float(_) => "Float",
            BindValue::Text(_) => "Text",
            BindValue::Bool(_) => "Bool",
            BindValue::Date(_) => "Date",
            BindValue::Time(_) => "Time",
            BindValue::Timestamp(_) => "Timestamp",
            BindValue::Json(_) => "Json",
            BindValue::Blob(_) => "Blob",
            BindValue::Other(_) => "Other",
        }
    }
}

impl fmt::Debug for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Other(_) => f.debug_tuple("Other").field(&"<opaque>").finish(),
            _ => f
                .debug_tuple(self.type_name())
                .field(&self.raw_text())
                .finish(),
        }
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Float(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<NaiveDate> for BindValue {
    fn from(value: NaiveDate) -> Self {
        BindValue::Date(value)
    }
}

impl From<NaiveTime> for BindValue {
    fn from(value: NaiveTime) -> Self {
        BindValue::Time(value)
    }
}

impl From<NaiveDateTime> for BindValue {
    fn from(value: NaiveDateTime) -> Self {
        BindValue::Timestamp(value)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(BindValue::Null, Into::into)
    }
}

/// The kind of driver object a call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Connection,
    Statement,
    PreparedStatement,
    /// Result cursor; its calls are routed to the resultset channel
    ResultSet,
}

impl ObjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Connection => "Connection",
            ObjectKind::Statement => "Statement",
            ObjectKind::PreparedStatement => "PreparedStatement",
            ObjectKind::ResultSet => "ResultSet",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit used when rendering elapsed time in timing lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum TimingUnit {
    /// `{executed in N msec}`
    #[default]
    Msec,
    /// `{executed in N nanoSec}`
    Nanos,
}

impl TimingUnit {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            TimingUnit::Msec => "msec",
            TimingUnit::Nanos => "nanoSec",
        }
    }

    /// Parse a configured unit name.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConfigError` for anything other than `msec` or `nanos`.
    pub fn parse(value: &str) -> Result<Self, SqlSpyError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "msec" | "ms" => Ok(TimingUnit::Msec),
            "nanos" | "nanosec" | "ns" => Ok(TimingUnit::Nanos),
            other => Err(SqlSpyError::ConfigError(format!(
                "timing unit should be either 'msec' or 'nanos'. Was '{other}'."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_matches_plain_display() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 250)
            .unwrap();
        assert_eq!(BindValue::Timestamp(ts).raw_text(), "2024-02-29 13:05:09.250");
        assert_eq!(BindValue::Blob(vec![1, 2, 3]).raw_text(), "<Blob of size 3>");
        assert_eq!(BindValue::Null.raw_text(), "null");
        assert_eq!(BindValue::other(42u8).raw_text(), "42");
    }

    struct Panicky;

    impl fmt::Display for Panicky {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("display blew up")
        }
    }

    #[test]
    fn raw_text_survives_a_panicking_display() {
        let value = BindValue::other(Panicky);
        assert_eq!(value.raw_text(), UNPRINTABLE);
        assert_eq!(format!("{value:?}"), "Other(\"<opaque>\")");
    }

    #[test]
    fn option_maps_to_null() {
        let none: Option<i64> = None;
        assert!(BindValue::from(none).is_null());
        assert!(matches!(BindValue::from(Some(3_i64)), BindValue::Int(3)));
    }

    #[test]
    fn timing_unit_parse_is_strict() {
        assert_eq!(TimingUnit::parse("MSEC").unwrap(), TimingUnit::Msec);
        assert_eq!(TimingUnit::parse("nanos").unwrap(), TimingUnit::Nanos);
        assert!(TimingUnit::parse("seconds").is_err());
    }
}
