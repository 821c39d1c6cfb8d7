use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{SpyConfig, SqlTypeFilter};

/// Prefix added to SQL run through a plain statement when usage warnings are on.
pub const STATEMENT_WARNING: &str = "{WARNING: Statement used to run SQL} ";

lazy_static! {
    static ref LEADING_KEYWORD: Option<Regex> =
        Regex::new(r"(?i)^\s*(select|insert|update|delete|create)").ok();
}

/// Whether `sql` passes the statement-type filter.
///
/// An inactive filter lets everything through. Otherwise only SQL starting with an allowed
/// keyword passes; anything shorter or unrecognized is dropped.
#[must_use]
pub fn should_dump(filter: &SqlTypeFilter, sql: &str) -> bool {
    if !filter.is_active() {
        return true;
    }
    LEADING_KEYWORD
        .as_ref()
        .and_then(|re| re.captures(sql))
        .is_some_and(|caps| filter.allows(&caps[1]))
}

/// Trimming, wrapping and semicolon settings for dumped SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlLayout {
    pub trim: bool,
    /// 0 disables wrapping
    pub max_line_length: u64,
    pub add_semicolon: bool,
}

impl SqlLayout {
    #[must_use]
    pub fn from_config(config: &SpyConfig) -> Self {
        Self {
            trim: config.trim_sql,
            max_line_length: config.max_line_length,
            add_semicolon: config.add_semicolon,
        }
    }

    /// Lay out SQL for a log line.
    ///
    /// Wrapping re-emits each whitespace-separated token followed by one space and breaks
    /// the line once the running length passes the maximum. The semicolon goes on last.
    #[must_use]
    pub fn apply(&self, sql: &str) -> String {
        let sql = if self.trim { sql.trim() } else { sql };
        let mut out = String::with_capacity(sql.len() + 8);

        if self.max_line_length == 0 {
            out.push_str(sql);
        } else {
            let mut line_length: u64 = 0;
            for token in sql.split_whitespace() {
                out.push_str(token);
                out.push(' ');
                line_length += token.chars().count() as u64 + 1;
                if line_length > self.max_line_length {
                    out.push('\n');
                    line_length = 0;
                }
            }
        }

        if self.add_semicolon {
            out.push(';');
        }
        out
    }
}

/// `batching N statements:` followed by one numbered line per statement.
#[must_use]
pub fn batch_report(statements: &[String]) -> String {
    let count = statements.len();
    let width = count.to_string().len();
    let mut out = format!("batching {count} statements:");
    for (i, sql) in statements.iter().enumerate() {
        out.push_str(&format!("\n{:>width$}:  {sql}", i + 1));
    }
    out
}
