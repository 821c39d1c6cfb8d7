use super::default::{DATE_TIME_FORMAT, as_date_time, format_default};
use super::{DialectFormatter, FormatOptions};
use crate::error::SqlSpyError;
use crate::types::BindValue;

/// Format mask handed to `to_date`, matching [`DATE_TIME_FORMAT`].
const ORACLE_DATE_MASK: &str = "mm/dd/yyyy hh24:mi:ss.ff3";

/// Oracle: every date/time value becomes a `to_date(...)` call so it is compared as a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleFormatter;

impl DialectFormatter for OracleFormatter {
    fn format_value(&self, value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError> {
        match value {
            BindValue::Date(_) | BindValue::Time(_) | BindValue::Timestamp(_) => Ok(format!(
                "to_date('{}', '{ORACLE_DATE_MASK}')",
                as_date_time(value).format(DATE_TIME_FORMAT)
            )),
            _ => format_default(value, opts),
        }
    }
}
