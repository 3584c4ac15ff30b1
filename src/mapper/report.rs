use crate::core::{EntityHandle, EntityType, MapError};

/// A record that could not be mapped; the rest of the batch still was.
///
/// Writes made before the failure are not rolled back. When the record's own
/// entity was already resolved, `partial` names it.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record in the incoming sequence
    pub index: usize,
    pub partial: Option<EntityHandle>,
    pub error: MapError,
}

/// A field left untouched because its value could not be coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub entity_type: EntityType,
    pub field: String,
    pub reason: String,
}

/// Outcome of one top-level batch.
#[derive(Debug)]
pub struct BatchReport {
    pub entity_type: EntityType,
    /// Root entities of fully mapped records, in record order
    pub mapped: Vec<EntityHandle>,
    pub failures: Vec<RecordFailure>,
    pub skipped_fields: Vec<FieldIssue>,
    /// Entities removed from a to-many relationship and deleted
    pub deleted: usize,
    /// Entities removed from a to-many relationship but kept in storage
    pub unlinked: usize,
}

impl BatchReport {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            mapped: Vec::new(),
            failures: Vec::new(),
            skipped_fields: Vec::new(),
            deleted: 0,
            unlinked: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.mapped.len() + self.failures.len()
    }

    /// No failed records and no skipped fields.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped_fields.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} mapped, {} failed, {} fields skipped, {} deleted, {} unlinked",
            self.entity_type,
            self.mapped.len(),
            self.failures.len(),
            self.skipped_fields.len(),
            self.deleted,
            self.unlinked
        )
    }
}
