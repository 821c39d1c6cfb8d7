//! Attributes a logged call to the application code that made it.

use std::backtrace::Backtrace;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// Qualifier prefix of every frame that belongs to the spy itself.
pub const INSTRUMENTATION_PREFIX: &str = "sql_spy::";

/// One resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Fully qualified function path, e.g. `my_app::orders::load`
    pub qualifier: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    #[must_use]
    pub fn new(qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Qualifier with trait-impl angle brackets removed, so
    /// `<sql_spy::Foo as Drop>::drop` is matched by its leading path.
    fn path(&self) -> &str {
        self.qualifier.trim_start_matches('<')
    }

    #[must_use]
    pub fn is_instrumentation(&self) -> bool {
        self.path().starts_with(INSTRUMENTATION_PREFIX)
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.path().starts_with(prefix)
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({file}:{line})", self.qualifier),
            (Some(file), None) => write!(f, "{}({file})", self.qualifier),
            _ => write!(f, "{}(Unknown Source)", self.qualifier),
        }
    }
}

/// Source of the current call stack, innermost frame first.
pub trait CallSiteResolver: Send + Sync {
    fn capture(&self) -> Vec<StackFrame>;
}

/// Captures the live stack through `std::backtrace`.
///
/// Frames belonging to the capture machinery itself (everything before the first
/// instrumentation frame) are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceResolver;

impl CallSiteResolver for BacktraceResolver {
    fn capture(&self) -> Vec<StackFrame> {
        let rendered = Backtrace::force_capture().to_string();
        let frames = parse_backtrace(&rendered);
        match frames.iter().position(StackFrame::is_instrumentation) {
            Some(first) => frames[first..].to_vec(),
            None => frames,
        }
    }
}

/// A canned stack, for tests and for callers that already have frames.
#[derive(Debug, Clone, Default)]
pub struct FixedFrames(pub Vec<StackFrame>);

impl CallSiteResolver for FixedFrames {
    fn capture(&self) -> Vec<StackFrame> {
        self.0.clone()
    }
}

lazy_static! {
    static ref FRAME_LINE: Option<Regex> = Regex::new(r"^\s*\d+:\s+(.+?)\s*$").ok();
    static ref LOCATION_LINE: Option<Regex> =
        Regex::new(r"^\s*at\s+(.+?):(\d+)(?::\d+)?\s*$").ok();
}

/// Parse the `Display` form of a `std::backtrace::Backtrace`.
#[must_use]
pub fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    let (Some(frame_line), Some(location_line)) = (FRAME_LINE.as_ref(), LOCATION_LINE.as_ref())
    else {
        return Vec::new();
    };
    let mut frames: Vec<StackFrame> = Vec::new();
    for line in rendered.lines() {
        if let Some(caps) = frame_line.captures(line) {
            frames.push(StackFrame::new(&caps[1]));
        } else if let Some(caps) = location_line.captures(line) {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    frame.file = Some(caps[1].to_string());
                    frame.line = caps[2].parse().ok();
                }
            }
        }
    }
    frames
}

/// The frame a call is attributed to.
///
/// Walks innermost to outermost remembering the last instrumentation frame. With
/// `app_prefix`, the first non-instrumentation frame starting with it wins outright;
/// otherwise the frame just outside the last instrumentation frame is used. A stack with no
/// instrumentation at all attributes to its first frame.
#[must_use]
pub fn resolve<'a>(frames: &'a [StackFrame], app_prefix: Option<&str>) -> Option<&'a StackFrame> {
    let mut last_instrumentation = None;
    for (i, frame) in frames.iter().enumerate() {
        if frame.is_instrumentation() {
            last_instrumentation = Some(i);
        } else if app_prefix.is_some_and(|prefix| frame.starts_with(prefix)) {
            return Some(frame);
        }
    }
    let index = last_instrumentation.map_or(0, |i| i + 1);
    frames.get(index).or_else(|| frames.last())
}

/// Every non-instrumentation frame, in stack order.
#[must_use]
pub fn verbose(frames: &[StackFrame]) -> Vec<&StackFrame> {
    frames.iter().filter(|f| !f.is_instrumentation()).collect()
}

/// Debug-info text placed in front of detailed log lines.
///
/// Full mode renders one `at <frame>` line per non-instrumentation frame, continuation
/// lines indented by two spaces. The default is a single frame preceded by a space.
#[must_use]
pub fn render_debug_info(frames: &[StackFrame], full: bool, app_prefix: Option<&str>) -> String {
    if full {
        let mut out = String::new();
        for (i, frame) in verbose(frames).into_iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str("at ");
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out
    } else {
        match resolve(frames, app_prefix) {
            Some(frame) => format!(" {frame}"),
            None => String::new(),
        }
    }
}
