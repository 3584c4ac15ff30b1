use crate::core::{EntityHandle, EntityType, Identity, Result};
use crate::storage::PersistenceStore;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Id(i64),
    Uuid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub created: u64,
}

/// Session-scoped identity map from `(entity type, id | uuid)` to the handle
/// resolved for it.
///
/// Not shared between sessions; each `BatchProcessor` owns one.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<(EntityType, IdentityKey), EntityHandle>,
    /// Every handle resolved or created this session, keyed or not
    resolved: HashSet<EntityHandle>,
    stats: CacheStats,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `identity`, otherwise look it up in the
    /// store (primary id first, then uuid), otherwise create a new entity.
    pub fn lookup_or_create<S>(&mut self, store: &mut S, identity: &Identity) -> Result<EntityHandle>
    where
        S: PersistenceStore + ?Sized,
    {
        if let Some(handle) = self.get(identity) {
            self.stats.hits += 1;
            // A uuid seen for the first time alongside a cached id still
            // needs its own entry.
            self.remember(identity, handle);
            return Ok(handle);
        }
        self.stats.misses += 1;

        let found = if identity.is_anonymous() {
            None
        } else {
            store.find_entity(
                &identity.entity_type,
                identity.primary_id,
                identity.uuid.as_deref(),
            )?
        };

        let handle = match found {
            Some(handle) => handle,
            None => {
                self.stats.created += 1;
                store.create_entity(&identity.entity_type)?
            }
        };

        self.remember(identity, handle);
        Ok(handle)
    }

    /// Cached handle for `identity`, without touching storage.
    pub fn get(&self, identity: &Identity) -> Option<EntityHandle> {
        Self::keys(identity).find_map(|key| self.entries.get(&key).copied())
    }

    /// Whether `handle` was resolved at any point in this session.
    pub fn contains_handle(&self, handle: EntityHandle) -> bool {
        self.resolved.contains(&handle)
    }

    /// Number of identity entries (an entity cached by id and uuid counts twice).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct handles resolved this session.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Distinct cached handles of one entity type.
    pub fn handles_of(&self, entity_type: &str) -> HashSet<EntityHandle> {
        self.entries
            .iter()
            .filter(|((ty, _), _)| ty.as_str() == entity_type)
            .map(|(_, handle)| *handle)
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Forget a handle whose entity was deleted from storage.
    pub fn evict(&mut self, handle: EntityHandle) {
        self.entries.retain(|_, cached| *cached != handle);
        self.resolved.remove(&handle);
    }

    /// Drop every entry. Persisted data is untouched.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.resolved.clear();
        self.stats = CacheStats::default();
    }

    fn remember(&mut self, identity: &Identity, handle: EntityHandle) {
        for key in Self::keys(identity) {
            self.entries.entry(key).or_insert(handle);
        }
        self.resolved.insert(handle);
    }

    fn keys(identity: &Identity) -> impl Iterator<Item = (EntityType, IdentityKey)> + '_ {
        let by_id = identity
            .primary_id
            .map(|id| (identity.entity_type.clone(), IdentityKey::Id(id)));
        let by_uuid = identity
            .uuid
            .as_ref()
            .map(|uuid| (identity.entity_type.clone(), IdentityKey::Uuid(uuid.clone())));
        by_id.into_iter().chain(by_uuid)
    }
}
