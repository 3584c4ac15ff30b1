pub mod identity;

pub use identity::{CacheStats, IdentityCache};
