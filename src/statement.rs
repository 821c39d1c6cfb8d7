use std::sync::{Arc, Mutex, PoisonError};

use crate::params::BindParameterTracker;
use crate::reconstruct::reconstruct;
use crate::registry::ConnectionHandle;

/// A SQL template with `?` placeholders and the values bound to it so far.
#[derive(Debug)]
pub struct PreparedStatementHandle {
    template: String,
    tracker: BindParameterTracker,
    connection: Arc<ConnectionHandle>,
    batch: Mutex<Vec<String>>,
}

impl PreparedStatementHandle {
    #[must_use]
    pub fn new(connection: Arc<ConnectionHandle>, template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            tracker: BindParameterTracker::new(),
            connection,
            batch: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn tracker(&self) -> &BindParameterTracker {
        &self.tracker
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<ConnectionHandle> {
        &self.connection
    }

    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection.id()
    }

    /// Template with every tracked value substituted in.
    #[must_use]
    pub fn reconstructed(&self, with_type_hints: bool) -> String {
        reconstruct(&self.template, &self.tracker, with_type_hints).into_owned()
    }

    /// Queue one SQL text for the next batch report.
    pub fn push_batch(&self, sql: impl Into<String>) {
        self.batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.into());
    }

    /// Take the queued batch, leaving it empty.
    #[must_use]
    pub fn take_batch(&self) -> Vec<String> {
        std::mem::take(&mut *self.batch.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn batch_len(&self) -> usize {
        self.batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
