/// What to do when a field value cannot be coerced into its attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Log the field, leave the attribute untouched and carry on with the record.
    #[default]
    SkipField,
    /// Fail the whole record with `MapError::TypeCoercion`.
    AbortRecord,
}

/// Mapper configuration, fixed for the lifetime of a `BatchProcessor`.
///
/// # Examples
///
/// ```
/// use memomap::{CoercionPolicy, MapperConfig};
///
/// let config = MapperConfig::new()
///     .delete_not_provided(true)
///     .coercion_policy(CoercionPolicy::AbortRecord)
///     .to_many_depth(2);
/// assert!(config.delete_not_provided);
/// ```
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Delete entities dropped from a to-many relationship instead of only
    /// unlinking them
    pub delete_not_provided: bool,

    pub coercion_policy: CoercionPolicy,

    /// Number of nesting levels, counting the root records as level 1, whose
    /// to-many relationships are processed
    pub to_many_depth: usize,

    /// Reset the identity cache at the start of every top-level call
    pub reset_before_batch: bool,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self {
            delete_not_provided: false,
            coercion_policy: CoercionPolicy::default(),
            to_many_depth: 1,
            reset_before_batch: false,
        }
    }

    pub fn delete_not_provided(mut self, delete: bool) -> Self {
        self.delete_not_provided = delete;
        self
    }

    pub fn coercion_policy(mut self, policy: CoercionPolicy) -> Self {
        self.coercion_policy = policy;
        self
    }

    pub fn to_many_depth(mut self, depth: usize) -> Self {
        self.to_many_depth = depth;
        self
    }

    pub fn reset_before_batch(mut self, reset: bool) -> Self {
        self.reset_before_batch = reset;
        self
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new()
    }
}
