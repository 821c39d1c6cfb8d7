use std::fmt::Write;

use rusqlite::types::Value;

use crate::types::BindValue;

thread_local! {
    static TIMESTAMP_BUF: std::cell::RefCell<String> =
        std::cell::RefCell::new(String::with_capacity(32));
}

fn format_temporal(value: &BindValue) -> String {
    TIMESTAMP_BUF.with(|buf| {
        let mut borrow = buf.borrow_mut();
        borrow.clear();
        let written = match value {
            BindValue::Date(d) => write!(borrow, "{}", d.format("%F")),
            BindValue::Time(t) => write!(borrow, "{}", t.format("%T%.f")),
            BindValue::Timestamp(dt) => write!(borrow, "{}", dt.format("%F %T%.f")),
            _ => Ok(()),
        };
        if written.is_err() {
            return value.raw_text();
        }
        borrow.clone()
    })
}

/// Convert a bound value to what `SQLite` stores for it.
///
/// Booleans become integers, date/time values ISO text, JSON its serialized text, and
/// opaque values their `Display` text.
#[must_use]
pub fn bind_value_to_sqlite_value(value: &BindValue) -> Value {
    match value {
        BindValue::Null => Value::Null,
        BindValue::Int(i) => Value::Integer(*i),
        BindValue::Float(f) => Value::Real(*f),
        BindValue::Text(s) => Value::Text(s.clone()),
        BindValue::Bool(b) => Value::Integer(i64::from(*b)),
        BindValue::Date(_) | BindValue::Time(_) | BindValue::Timestamp(_) => {
            Value::Text(format_temporal(value))
        }
        BindValue::Json(json) => Value::Text(json.to_string()),
        BindValue::Blob(bytes) => Value::Blob(bytes.clone()),
        BindValue::Other(_) => Value::Text(value.raw_text()),
    }
}
