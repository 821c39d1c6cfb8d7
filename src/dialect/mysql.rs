use super::default::format_default;
use super::{DialectFormatter, FormatOptions, quote};
use crate::error::SqlSpyError;
use crate::types::BindValue;

/// MySQL: ISO-style literals the `mysql` client parses directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlFormatter;

impl DialectFormatter for MySqlFormatter {
    fn format_value(&self, value: &BindValue, opts: FormatOptions) -> Result<String, SqlSpyError> {
        match value {
            BindValue::Time(t) => Ok(quote(&t.format("%H:%M:%S").to_string())),
            BindValue::Date(d) => Ok(quote(&d.format("%Y-%m-%d").to_string())),
            BindValue::Timestamp(ts) => Ok(quote(&ts.format("%Y-%m-%d %H:%M:%S").to_string())),
            _ => format_default(value, opts),
        }
    }
}
