// ============================================================================
// memomap Library
// ============================================================================

//! Maps hierarchical, loosely-typed server payloads onto a persisted object
//! graph.
//!
//! A [`BatchProcessor`] validates a batch, then walks each record with an
//! [`EntityMapper`]: identity is resolved through a session-scoped
//! [`IdentityCache`] (falling back to storage, then creation), attributes are
//! coerced and written, and relationships are followed recursively. Storage
//! is reached only through the [`PersistenceStore`] trait; [`InMemoryStore`]
//! is the bundled implementation.
//!
//! # Examples
//!
//! ```
//! use memomap::{
//!     BatchProcessor, DataType, EntitySchema, InMemoryStore, MapperConfig, SchemaCatalog,
//! };
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = SchemaCatalog::new()
//!     .with_entity(
//!         EntitySchema::new("Priority")
//!             .attribute("id", DataType::Integer)
//!             .attribute("name", DataType::Text),
//!     )?;
//!
//! let store = InMemoryStore::new(catalog.clone());
//! let mut processor = BatchProcessor::new(store, catalog, MapperConfig::default());
//! processor.reset_mapper();
//!
//! let report = processor.process_static_data(
//!     "Priority",
//!     &json!([["id", "name"], [1, "Low"], [2, "High"]]),
//! )?;
//! assert_eq!(report.mapped.len(), 2);
//! assert_eq!(processor.store().count("Priority"), 2);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod core;
pub mod mapper;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use cache::IdentityCache;
pub use core::{
    DataType, EntityHandle, EntityType, Identity, MapError, Record, Result, StoreError,
    StoreResult, Value,
};
pub use mapper::{
    BatchProcessor, BatchReport, CoercionPolicy, EntityMapper, FieldIssue, MapperConfig,
    ProcessorState, RecordFailure,
};
pub use schema::{
    Cardinality, EntitySchema, FieldKind, RelationshipDescriptor, SchemaCatalog,
};
pub use storage::{InMemoryStore, PersistenceStore, StoreStats};
