use std::fmt;

use crate::types::ObjectKind;

/// Description of one intercepted call, built by a wrapper and dropped once it is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub kind: ObjectKind,
    pub method: String,
    /// Arguments already rendered as text
    pub args: Vec<String>,
    pub connection_id: u64,
}

impl CallContext {
    #[must_use]
    pub fn new(kind: ObjectKind, connection_id: u64, method: impl Into<String>) -> Self {
        Self {
            kind,
            method: method.into(),
            args: Vec::new(),
            connection_id,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// `name(arg1, arg2)`
    #[must_use]
    pub fn method_call(&self) -> String {
        format!("{}({})", self.method, self.args.join(", "))
    }

    /// `<id>. <Kind>.<name(args)>`, the prefix of audit and exception lines.
    #[must_use]
    pub fn header(&self) -> String {
        format!("{}. {}.{}", self.connection_id, self.kind, self.method_call())
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header())
    }
}
