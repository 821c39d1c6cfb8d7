//! Offline profile of a timing log.
//!
//! The input is the sql-timing channel's output with entries separated by blank lines. An
//! entry may span several lines and must end with `{executed in N msec}` or
//! `{executed in N nanoSec}`; anything else is reported and skipped.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::SqlSpyError;
use crate::types::TimingUnit;

pub const DEFAULT_THRESHOLD_MSEC: u64 = 100;
pub const DEFAULT_TOP: usize = 1000;

const NANOS_PER_MSEC: u64 = 1_000_000;

lazy_static! {
    static ref EXECUTED_IN: Option<Regex> =
        Regex::new(r"\{executed in (\d+) (msec|nanoSec)\}\s*$").ok();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportOptions {
    /// Entries strictly slower than this are flagged
    pub threshold_msec: u64,
    /// How many flagged entries to keep, slowest first
    pub top: usize,
    /// Unit used by the text rendering
    pub unit: TimingUnit,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            threshold_msec: DEFAULT_THRESHOLD_MSEC,
            top: DEFAULT_TOP,
            unit: TimingUnit::Msec,
        }
    }
}

/// One flagged entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfiledSql {
    pub elapsed_nanos: u64,
    /// Line the entry starts on
    pub line: u64,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileReport {
    pub options: ReportOptions,
    pub lines: u64,
    /// Well-formed entries
    pub statements: u64,
    /// Start lines of the entries without a timing marker
    pub malformed: Vec<u64>,
    pub total_nanos: u64,
    pub max_nanos: u64,
    pub flagged_count: u64,
    pub flagged_total_nanos: u64,
    /// Slowest flagged entries, at most `options.top`
    pub top: Vec<ProfiledSql>,
}

impl ProfileReport {
    fn empty(options: ReportOptions) -> Self {
        Self {
            options,
            lines: 0,
            statements: 0,
            malformed: Vec::new(),
            total_nanos: 0,
            max_nanos: 0,
            flagged_count: 0,
            flagged_total_nanos: 0,
            top: Vec::new(),
        }
    }

    /// Profile a log file.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::IoError` if the file cannot be opened, or
    /// `SqlSpyError::ReportError` if reading it fails part way.
    pub fn from_path(path: impl AsRef<Path>, options: ReportOptions) -> Result<Self, SqlSpyError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), options)
    }

    /// Profile log text from any buffered reader.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD and the line is still profiled.
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ReportError` if reading a line fails.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        options: ReportOptions,
    ) -> Result<Self, SqlSpyError> {
        let mut report = Self::empty(options);
        let mut flagged = Vec::new();
        let mut entry = String::new();
        let mut entry_start = 0;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| SqlSpyError::ReportError {
                    line: report.lines + 1,
                    message: e.to_string(),
                })?;
            if read == 0 {
                break;
            }
            report.lines += 1;
            let line = decode_line(&buf, report.lines);
            if line.is_empty() {
                report.take_entry(&mut entry, entry_start, &mut flagged);
            } else {
                if entry.is_empty() {
                    entry_start = report.lines;
                }
                entry.push_str(&line);
            }
        }
        report.take_entry(&mut entry, entry_start, &mut flagged);

        report.flagged_count = flagged.len() as u64;
        flagged.sort_by(|a: &ProfiledSql, b: &ProfiledSql| b.elapsed_nanos.cmp(&a.elapsed_nanos));
        flagged.truncate(report.options.top);
        report.top = flagged;
        Ok(report)
    }

    fn take_entry(&mut self, entry: &mut String, line: u64, flagged: &mut Vec<ProfiledSql>) {
        if entry.is_empty() {
            return;
        }
        let sql = std::mem::take(entry);
        let Some(elapsed_nanos) = parse_elapsed(&sql) else {
            tracing::warn!(line, "sql w/o timing info found at line {line}");
            self.malformed.push(line);
            return;
        };

        self.statements += 1;
        self.total_nanos = self.total_nanos.saturating_add(elapsed_nanos);
        self.max_nanos = self.max_nanos.max(elapsed_nanos);
        if elapsed_nanos > self.threshold_nanos() {
            self.flagged_total_nanos = self.flagged_total_nanos.saturating_add(elapsed_nanos);
            flagged.push(ProfiledSql {
                elapsed_nanos,
                line,
                sql,
            });
        }
    }

    fn threshold_nanos(&self) -> u64 {
        self.options.threshold_msec.saturating_mul(NANOS_PER_MSEC)
    }

    #[must_use]
    pub fn total_msec(&self) -> u64 {
        self.total_nanos / NANOS_PER_MSEC
    }

    #[must_use]
    pub fn flagged_total_msec(&self) -> u64 {
        self.flagged_total_nanos / NANOS_PER_MSEC
    }

    /// Mean time per well-formed statement.
    #[must_use]
    pub fn msec_per_statement(&self) -> Option<f64> {
        (self.statements > 0).then(|| {
            self.total_nanos as f64 / NANOS_PER_MSEC as f64 / self.statements as f64
        })
    }

    /// Statements per millisecond; the figure the text report prints as its average.
    #[must_use]
    pub fn statements_per_msec(&self) -> Option<f64> {
        (self.total_nanos > 0).then(|| {
            self.statements as f64 / (self.total_nanos as f64 / NANOS_PER_MSEC as f64)
        })
    }

    /// # Errors
    ///
    /// Returns `SqlSpyError::FormatError` if serialization fails.
    pub fn to_json(&self) -> Result<String, SqlSpyError> {
        serde_json::to_string_pretty(self).map_err(|e| SqlSpyError::FormatError(e.to_string()))
    }
}

/// One line without its terminator, decoded lossily.
fn decode_line(buf: &[u8], line: u64) -> Cow<'_, str> {
    let bytes = buf.strip_suffix(b"\n").unwrap_or(buf);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    if matches!(text, Cow::Owned(_)) {
        tracing::warn!(line, "invalid UTF-8 at line {line}, replaced");
    }
    text
}

fn parse_elapsed(entry: &str) -> Option<u64> {
    let caps = EXECUTED_IN.as_ref()?.captures(entry)?;
    let value: u64 = caps[1].parse().ok()?;
    match &caps[2] {
        "msec" => value.checked_mul(NANOS_PER_MSEC),
        _ => Some(value),
    }
}

fn in_unit(nanos: u64, unit: TimingUnit) -> u64 {
    match unit {
        TimingUnit::Msec => nanos / NANOS_PER_MSEC,
        TimingUnit::Nanos => nanos,
    }
}

fn unit_name(unit: TimingUnit) -> &'static str {
    match unit {
        TimingUnit::Msec => "millisecond",
        TimingUnit::Nanos => "nanosecond",
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.options.unit;
        let name = unit_name(unit);
        let total = in_unit(self.total_nanos, unit);

        writeln!(f, "processed {} lines.", self.lines)?;
        writeln!(f, "Number of sql statements:  {}", self.statements)?;
        if !self.malformed.is_empty() {
            writeln!(f, "Entries without timing info:  {}", self.malformed.len())?;
        }
        writeln!(f, "Total number of {name}s    :  {total}")?;
        if total > 0 {
            // statements per unit under the unit/statement label, as this report always printed it
            writeln!(f, "Average {name}/statement  :  {}", self.statements / total)?;
        }

        if self.flagged_count == 0 {
            return Ok(());
        }
        let threshold = in_unit(self.threshold_nanos(), unit);
        let flagged_total = in_unit(self.flagged_total_nanos, unit);
        writeln!(f, "Sql statements that took more than {threshold} {name}s were flagged.")?;
        writeln!(f, "Flagged sql statements              :  {}", self.flagged_count)?;
        writeln!(f, "Flagged sql Total number of {name}s    :  {flagged_total}")?;
        writeln!(
            f,
            "Flagged sql Average {name}/statement  :  {}",
            flagged_total / self.flagged_count
        )?;

        let shown = self.top.len();
        writeln!(f, "top {shown} offender{}:", if shown == 1 { "" } else { "s" })?;
        let width = in_unit(self.max_nanos, unit).to_string().len();
        for p in &self.top {
            writeln!(f, "{:>width$} {}", in_unit(p.elapsed_nanos, unit), p.sql)?;
        }
        Ok(())
    }
}
