use super::default::{DATE_TIME_FORMAT, format_default};
use super::{DialectFormatter, FormatOptions, quote};
use crate::error::SqlSpyError;
use crate::types::BindValue;

const DATE_FORMAT: &str = "%m/%d/%Y";

/// SQL Server: date-only values drop the time part; time-only values use the default form.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerFormatter;

impl DialectFormatter for SqlServerFormatter {
    fn format_value(&self, value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError> {
        match value {
            BindValue::Date(d) => Ok(quote(&d.format(DATE_FORMAT).to_string())),
            BindValue::Timestamp(ts) => Ok(quote(&ts.format(DATE_TIME_FORMAT).to_string())),
            _ => format_default(value, opts),
        }
    }
}
