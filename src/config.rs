//! Read-only settings shared by the router, formatter and wrappers.
//!
//! Settings come from a key/value lookup (normally the process environment). Every key is
//! optional; what was read, defaulted or rejected is queued as setup messages which
//! [`crate::SqlSpy::new`] logs on the setup channel once a sink exists.

use serde::Serialize;

use crate::dialect::{Dialect, FormatOptions};
use crate::error::SqlSpyError;
use crate::timing::TimingThresholds;
use crate::types::TimingUnit;

pub const DIALECT: &str = "SQLSPY_DIALECT";
pub const DUMP_BOOLEAN_AS_TRUE_FALSE: &str = "SQLSPY_DUMP_BOOLEAN_AS_TRUE_FALSE";
pub const DUMP_SQL_MAX_LINE_LENGTH: &str = "SQLSPY_DUMP_SQL_MAX_LINE_LENGTH";
pub const DUMP_SQL_ADD_SEMICOLON: &str = "SQLSPY_DUMP_SQL_ADD_SEMICOLON";
pub const TRIM_SQL: &str = "SQLSPY_TRIM_SQL";
pub const DUMP_SQL_SELECT: &str = "SQLSPY_DUMP_SQL_SELECT";
pub const DUMP_SQL_INSERT: &str = "SQLSPY_DUMP_SQL_INSERT";
pub const DUMP_SQL_UPDATE: &str = "SQLSPY_DUMP_SQL_UPDATE";
pub const DUMP_SQL_DELETE: &str = "SQLSPY_DUMP_SQL_DELETE";
pub const DUMP_SQL_CREATE: &str = "SQLSPY_DUMP_SQL_CREATE";
pub const DUMP_FULL_DEBUG_STACK_TRACE: &str = "SQLSPY_DUMP_FULL_DEBUG_STACK_TRACE";
pub const DEBUG_STACK_PREFIX: &str = "SQLSPY_DEBUG_STACK_PREFIX";
pub const STATEMENT_WARN: &str = "SQLSPY_STATEMENT_WARN";
pub const SQLTIMING_WARN_THRESHOLD: &str = "SQLSPY_SQLTIMING_WARN_THRESHOLD";
pub const SQLTIMING_ERROR_THRESHOLD: &str = "SQLSPY_SQLTIMING_ERROR_THRESHOLD";
pub const TIMING_UNIT: &str = "SQLSPY_TIMING_UNIT";
pub const SQL_SHOW_PARAMS: &str = "SQLSPY_SQL_SHOW_PARAMS";
pub const DUMP_TYPE_HINTS: &str = "SQLSPY_DUMP_TYPE_HINTS";

pub const DEFAULT_MAX_LINE_LENGTH: u64 = 90;

/// Which statement types are dumped to the SQL channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SqlTypeFilter {
    pub select: bool,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
    pub create: bool,
}

impl Default for SqlTypeFilter {
    fn default() -> Self {
        Self {
            select: true,
            insert: true,
            update: true,
            delete: true,
            create: true,
        }
    }
}

impl SqlTypeFilter {
    /// Filtering applies only when at least one type is switched off.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !(self.select && self.insert && self.update && self.delete && self.create)
    }

    /// Whether a statement whose leading keyword is `keyword` may be dumped.
    #[must_use]
    pub fn allows(&self, keyword: &str) -> bool {
        match keyword.to_ascii_lowercase().as_str() {
            "select" => self.select,
            "insert" => self.insert,
            "update" => self.update,
            "delete" => self.delete,
            "create" => self.create,
            _ => false,
        }
    }
}

/// Effective spy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpyConfig {
    /// Forces a dialect instead of deriving it from the driver name
    pub dialect: Option<Dialect>,
    pub format: FormatOptions,
    /// Wrap dumped SQL after roughly this many characters; 0 disables wrapping
    pub max_line_length: u64,
    pub add_semicolon: bool,
    pub trim_sql: bool,
    pub filter: SqlTypeFilter,
    pub full_debug_stack_trace: bool,
    pub debug_stack_prefix: Option<String>,
    pub statement_warn: bool,
    pub thresholds: TimingThresholds,
    pub timing_unit: TimingUnit,
    /// When false, SQL is logged as its template with placeholders intact
    pub show_params: bool,
    pub dump_type_hints: bool,
    #[serde(skip)]
    setup_messages: Vec<String>,
}

impl Default for SpyConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            format: FormatOptions::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            add_semicolon: false,
            trim_sql: true,
            filter: SqlTypeFilter::default(),
            full_debug_stack_trace: false,
            debug_stack_prefix: None,
            statement_warn: false,
            thresholds: TimingThresholds::default(),
            timing_unit: TimingUnit::Msec,
            show_params: true,
            dump_type_hints: false,
            setup_messages: Vec::new(),
        }
    }
}

impl SpyConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`SpyConfig::from_lookup`].
    pub fn from_env() -> Result<Self, SqlSpyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns the raw value of a key if it is set.
    ///
    /// Malformed booleans and numbers fall back to their defaults with a setup message.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ConfigError` for an unknown dialect or timing unit, or a
    /// show-params value other than `true`/`false`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SqlSpyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut loader = Loader {
            lookup,
            messages: vec!["... sql-spy initializing ...".to_string()],
        };
        let defaults = SpyConfig::default();

        let debug_stack_prefix = loader.string(DEBUG_STACK_PREFIX);
        let thresholds = TimingThresholds::new(
            loader.optional_number(SQLTIMING_WARN_THRESHOLD),
            loader.optional_number(SQLTIMING_ERROR_THRESHOLD),
        );
        let format = FormatOptions {
            boolean_as_true_false: loader.boolean(DUMP_BOOLEAN_AS_TRUE_FALSE, false),
        };
        let max_line_length = loader.number(DUMP_SQL_MAX_LINE_LENGTH, defaults.max_line_length);
        let full_debug_stack_trace = loader.boolean(DUMP_FULL_DEBUG_STACK_TRACE, false);
        let statement_warn = loader.boolean(STATEMENT_WARN, false);
        let filter = SqlTypeFilter {
            select: loader.boolean(DUMP_SQL_SELECT, true),
            insert: loader.boolean(DUMP_SQL_INSERT, true),
            update: loader.boolean(DUMP_SQL_UPDATE, true),
            delete: loader.boolean(DUMP_SQL_DELETE, true),
            create: loader.boolean(DUMP_SQL_CREATE, true),
        };
        let trim_sql = loader.boolean(TRIM_SQL, true);
        let add_semicolon = loader.boolean(DUMP_SQL_ADD_SEMICOLON, false);
        let dump_type_hints = loader.boolean(DUMP_TYPE_HINTS, false);

        let dialect = match loader.string(DIALECT) {
            Some(value) => Some(Dialect::parse(&value)?),
            None => None,
        };
        let timing_unit = match loader.string(TIMING_UNIT) {
            Some(value) => TimingUnit::parse(&value)?,
            None => defaults.timing_unit,
        };
        let show_params = match loader.string(SQL_SHOW_PARAMS) {
            Some(value) => parse_strict_bool(SQL_SHOW_PARAMS, &value)?,
            None => defaults.show_params,
        };

        loader.messages.push("... sql-spy initialized! ...".to_string());

        Ok(Self {
            dialect,
            format,
            max_line_length,
            add_semicolon,
            trim_sql,
            filter,
            full_debug_stack_trace,
            debug_stack_prefix,
            statement_warn,
            thresholds,
            timing_unit,
            show_params,
            dump_type_hints,
            setup_messages: loader.messages,
        })
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    #[must_use]
    pub fn with_boolean_as_true_false(mut self, enabled: bool) -> Self {
        self.format.boolean_as_true_false = enabled;
        self
    }

    #[must_use]
    pub fn with_max_line_length(mut self, max: u64) -> Self {
        self.max_line_length = max;
        self
    }

    #[must_use]
    pub fn with_add_semicolon(mut self, enabled: bool) -> Self {
        self.add_semicolon = enabled;
        self
    }

    #[must_use]
    pub fn with_trim_sql(mut self, enabled: bool) -> Self {
        self.trim_sql = enabled;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: SqlTypeFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_full_debug_stack_trace(mut self, enabled: bool) -> Self {
        self.full_debug_stack_trace = enabled;
        self
    }

    #[must_use]
    pub fn with_debug_stack_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.debug_stack_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_statement_warn(mut self, enabled: bool) -> Self {
        self.statement_warn = enabled;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: TimingThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_timing_unit(mut self, unit: TimingUnit) -> Self {
        self.timing_unit = unit;
        self
    }

    #[must_use]
    pub fn with_show_params(mut self, enabled: bool) -> Self {
        self.show_params = enabled;
        self
    }

    #[must_use]
    pub fn with_type_hints(mut self, enabled: bool) -> Self {
        self.dump_type_hints = enabled;
        self
    }

    /// Messages describing how each setting was resolved.
    #[must_use]
    pub fn setup_messages(&self) -> &[String] {
        &self.setup_messages
    }

    pub(crate) fn take_setup_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.setup_messages)
    }

    /// The effective settings as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::FormatError` if serialization fails.
    pub fn to_json(&self) -> Result<String, SqlSpyError> {
        serde_json::to_string_pretty(self).map_err(|e| SqlSpyError::FormatError(e.to_string()))
    }
}

/// `true`, `yes` and `on` (any case) are true; anything else is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on"
    )
}

fn parse_strict_bool(key: &str, value: &str) -> Result<bool, SqlSpyError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SqlSpyError::ConfigError(format!(
            "Value of {key} should be either 'true' or 'false'. Was '{other}'."
        ))),
    }
}

struct Loader<F> {
    lookup: F,
    messages: Vec<String>,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&mut self, key: &str) -> Option<String> {
        match (self.lookup)(key).filter(|v| !v.is_empty()) {
            Some(value) => {
                self.messages.push(format!("  {key} = {value}"));
                Some(value)
            }
            None => {
                self.messages.push(format!("x {key} is not defined"));
                None
            }
        }
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        let Some(raw) = (self.lookup)(key) else {
            self.messages.push(format!(
                "x {key} is not defined (using default value {default})"
            ));
            return default;
        };
        let value = if raw.trim().is_empty() {
            default
        } else {
            parse_bool(&raw)
        };
        self.messages.push(format!("  {key} = {value}"));
        value
    }

    fn optional_number(&mut self, key: &str) -> Option<u64> {
        let Some(raw) = (self.lookup)(key) else {
            self.messages.push(format!("x {key} is not defined"));
            return None;
        };
        match raw.trim().parse::<u64>() {
            Ok(value) => {
                self.messages.push(format!("  {key} = {value}"));
                Some(value)
            }
            Err(_) => {
                self.messages
                    .push(format!("x {key} \"{raw}\" is not a valid number"));
                None
            }
        }
    }

    fn number(&mut self, key: &str, default: u64) -> u64 {
        let Some(raw) = (self.lookup)(key) else {
            self.messages.push(format!(
                "x {key} is not defined (using default of {default})"
            ));
            return default;
        };
        match raw.trim().parse::<u64>() {
            Ok(value) => {
                self.messages.push(format!("  {key} = {value}"));
                value
            }
            Err(_) => {
                self.messages.push(format!(
                    "x {key} \"{raw}\" is not a valid number (using default of {default})"
                ));
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<SpyConfig, SqlSpyError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SpyConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.max_line_length, 90);
        assert!(cfg.trim_sql);
        assert!(!cfg.add_semicolon);
        assert!(cfg.show_params);
        assert!(!cfg.filter.is_active());
        assert_eq!(cfg.thresholds, TimingThresholds::default());
        assert!(
            cfg.setup_messages()
                .iter()
                .any(|m| m
                    == "x SQLSPY_DUMP_SQL_MAX_LINE_LENGTH is not defined (using default of 90)")
        );
    }

    #[test]
    fn booleans_accept_yes_and_on() {
        let cfg = load(&[
            (DUMP_SQL_ADD_SEMICOLON, "YES"),
            (DUMP_BOOLEAN_AS_TRUE_FALSE, "on"),
            (TRIM_SQL, "nope"),
            (DUMP_SQL_SELECT, ""),
            (DUMP_SQL_DELETE, "false"),
        ])
        .unwrap();
        assert!(cfg.add_semicolon);
        assert!(cfg.format.boolean_as_true_false);
        assert!(!cfg.trim_sql);
        assert!(cfg.filter.select);
        assert!(!cfg.filter.delete);
        assert!(cfg.filter.is_active());
    }

    #[test]
    fn bad_numbers_fall_back_with_a_message() {
        let cfg = load(&[
            (DUMP_SQL_MAX_LINE_LENGTH, "wide"),
            (SQLTIMING_WARN_THRESHOLD, "250"),
            (SQLTIMING_ERROR_THRESHOLD, "-1"),
        ])
        .unwrap();
        assert_eq!(cfg.max_line_length, 90);
        assert_eq!(cfg.thresholds, TimingThresholds::new(Some(250), None));
        assert!(
            cfg.setup_messages()
                .iter()
                .any(|m| m.contains("\"wide\" is not a valid number"))
        );
    }

    #[test]
    fn show_params_is_strict() {
        let err = load(&[(SQL_SHOW_PARAMS, "moo")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Value of SQLSPY_SQL_SHOW_PARAMS should be either 'true' or \
             'false'. Was 'moo'."
        );
        assert!(!load(&[(SQL_SHOW_PARAMS, "false")]).unwrap().show_params);
    }

    #[test]
    fn enumerated_values_are_fatal() {
        assert!(load(&[(DIALECT, "db2")]).is_err());
        assert!(load(&[(TIMING_UNIT, "fortnights")]).is_err());
        let cfg = load(&[(DIALECT, "oracle"), (TIMING_UNIT, "nanos")]).unwrap();
        assert_eq!(cfg.dialect, Some(Dialect::Oracle));
        assert_eq!(cfg.timing_unit, TimingUnit::Nanos);
    }

    #[test]
    fn filter_matches_keywords() {
        let filter = SqlTypeFilter {
            select: false,
            ..SqlTypeFilter::default()
        };
        assert!(!filter.allows("SELECT"));
        assert!(filter.allows("Insert"));
        assert!(!filter.allows("merge"));
    }

    #[test]
    fn json_dump_skips_setup_messages() {
        let json = load(&[]).unwrap().to_json().unwrap();
        assert!(json.contains("\"max_line_length\": 90"));
        assert!(!json.contains("setup_messages"));
    }
}
