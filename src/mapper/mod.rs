//! Record mapping: turns payload records into entities in a persistence store.
//!
//! - `config.rs` - mapper configuration (deletion and coercion policies)
//! - `coercion.rs` - JSON to typed attribute values
//! - `static_data.rs` - header-plus-rows reshaping
//! - `entity_mapper.rs` - per-record resolution and recursive relationship walk
//! - `batch.rs` - top-level batch driver and session lifecycle
//! - `report.rs` - per-batch outcome

mod batch;
mod coercion;
mod config;
mod entity_mapper;
mod report;
mod static_data;

pub use batch::{BatchProcessor, ProcessorState};
pub use coercion::{CoercionError, ValueCoercer};
pub use config::{CoercionPolicy, MapperConfig};
pub use entity_mapper::{EntityMapper, MappingStats, extract_identity};
pub use report::{BatchReport, FieldIssue, RecordFailure};
pub use static_data::reshape_static_data;
