use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SqlSpyError;

/// One tracked parameter of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindParameter {
    /// 1-based placeholder position
    pub index: usize,
    pub type_hint: Option<String>,
    /// Value already rendered by the connection's dialect
    pub value: String,
}

impl BindParameter {
    /// Rendered value, prefixed with `(hint)` when hints are requested and present.
    #[must_use]
    pub fn render(&self, with_type_hint: bool) -> String {
        match (&self.type_hint, with_type_hint) {
            (Some(hint), true) => format!("({hint}){}", self.value),
            _ => self.value.clone(),
        }
    }
}

/// Sparse, 1-based list of formatted parameters for one prepared statement.
///
/// Binding out of order never shifts earlier values: gaps are held as explicit `None` slots
/// until filled. All access goes through one mutex so a statement shared between threads
/// sees whole updates only.
#[derive(Debug, Default)]
pub struct BindParameterTracker {
    slots: Mutex<Vec<Option<BindParameter>>>,
}

impl BindParameterTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<BindParameter>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the formatted value for placeholder `index` (1-based).
    ///
    /// # Errors
    ///
    /// Returns `SqlSpyError::ParameterError` if `index` is 0.
    pub fn set(
        &self,
        index: usize,
        type_hint: Option<&str>,
        formatted: impl Into<String>,
    ) -> Result<(), SqlSpyError> {
        let Some(slot) = index.checked_sub(1) else {
            return Err(SqlSpyError::ParameterError(
                "parameter indexes start at 1".into(),
            ));
        };
        let param = BindParameter {
            index,
            type_hint: type_hint.map(str::to_string),
            value: formatted.into(),
        };
        let mut slots = self.lock();
        if slot >= slots.len() {
            slots.resize(slot + 1, None);
        }
        slots[slot] = Some(param);
        Ok(())
    }

    /// Formatted value for placeholder `index`, or `None` if it was never set.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<String> {
        self.get_parameter(index).map(|p| p.value)
    }

    #[must_use]
    pub fn get_parameter(&self, index: usize) -> Option<BindParameter> {
        let slot = index.checked_sub(1)?;
        self.lock().get(slot).cloned().flatten()
    }

    /// Forget every tracked value.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of slots, i.e. the highest index set since the last clear.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every slot, rendered, taken under a single lock.
    #[must_use]
    pub fn snapshot(&self, with_type_hints: bool) -> Vec<Option<String>> {
        self.lock()
            .iter()
            .map(|slot| slot.as_ref().map(|p| p.render(with_type_hints)))
            .collect()
    }
}
