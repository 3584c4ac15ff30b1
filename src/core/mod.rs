pub mod error;
pub mod types;
pub mod value;

pub use error::{MapError, Result, StoreError, StoreResult};
pub use types::{EntityHandle, EntityType, Identity};
pub use value::{DataType, Value};

/// An incoming payload record: ordered field name to loosely-typed value.
pub type Record = serde_json::Map<String, serde_json::Value>;
