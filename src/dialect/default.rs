use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{DialectFormatter, FormatOptions, quote};
use crate::error::SqlSpyError;
use crate::types::BindValue;

/// `MM/dd/yyyy HH:mm:ss.SSS`
pub const DATE_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.3f";

/// Formatter used when the driver is not in the dialect table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl DialectFormatter for DefaultFormatter {
    fn format_value(&self, value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError> {
        format_default(value, opts)
    }
}

/// Shared fallback for every dialect.
///
/// # Errors
///
/// Returns `SqlSpyError::FormatError` if an opaque value fails to render.
pub fn format_default(value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError> {
    let text = match value {
        BindValue::Null => "NULL".to_string(),
        BindValue::Text(s) => quote(s),
        BindValue::Bool(b) => format_bool(*b, opts).to_string(),
        BindValue::Date(_) | BindValue::Time(_) | BindValue::Timestamp(_) => {
            quote(&as_date_time(value).format(DATE_TIME_FORMAT).to_string())
        }
        BindValue::Json(json) => quote(&json.to_string()),
        BindValue::Blob(_) => quote(&value.try_raw_text()?),
        BindValue::Int(_) | BindValue::Float(_) | BindValue::Other(_) => value.try_raw_text()?,
    };
    Ok(text)
}

fn format_bool(value: bool, opts: FormatOptions) -> &'static str {
    match (opts.boolean_as_true_false, value) {
        (true, true) => "true",
        (true, false) => "false",
        (false, true) => "1",
        (false, false) => "0",
    }
}

/// Widen any date/time value to a full timestamp: dates get midnight, times get the epoch date.
///
/// Non-temporal values map to the epoch; callers only pass temporal variants.
pub(crate) fn as_date_time(value: &BindValue) -> NaiveDateTime {
    let epoch = NaiveDate::default();
    match value {
        BindValue::Date(d) => d.and_time(NaiveTime::default()),
        BindValue::Time(t) => epoch.and_time(*t),
        BindValue::Timestamp(ts) => *ts,
        _ => epoch.and_time(NaiveTime::default()),
    }
}
