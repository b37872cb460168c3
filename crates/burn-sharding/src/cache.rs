use core::hash::Hash;

use hashbrown::HashMap;

use crate::schema::{OpSchema, SchemaKey};

/// Memoizes sharding propagation results by schema identity.
///
/// The cache takes `&mut self` and holds no lock; share it across threads behind a mutex.
#[derive(Debug)]
pub struct ShardingCache<T, V> {
    entries: HashMap<SchemaKey<T>, V>,
    hits: usize,
    misses: usize,
}

impl<T, V> Default for ShardingCache<T, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<T: Clone + Hash + Eq, V> ShardingCache<T, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for a call with the same identity as `schema`.
    pub fn get(&mut self, schema: &OpSchema<T>) -> Option<&V> {
        let key = schema.identity_key();
        match self.entries.get(&key) {
            Some(value) => {
                self.hits += 1;
                log::trace!("Sharding cache hit for {}", schema.op());
                Some(value)
            }
            None => {
                self.misses += 1;
                log::trace!("Sharding cache miss for {}", schema.op());
                None
            }
        }
    }

    /// Caches the result for `schema`, returning the previous one if any.
    pub fn insert(&mut self, schema: &OpSchema<T>, value: V) -> Option<V> {
        self.entries.insert(schema.identity_key(), value)
    }

    /// The cached result for `schema`, running `propagate` on a miss.
    pub fn get_or_insert_with<F>(&mut self, schema: &OpSchema<T>, propagate: F) -> &V
    where
        F: FnOnce(&OpSchema<T>) -> V,
    {
        let key = schema.identity_key();
        if self.entries.contains_key(&key) {
            self.hits += 1;
            log::trace!("Sharding cache hit for {}", schema.op());
        } else {
            self.misses += 1;
            log::trace!("Sharding cache miss for {}", schema.op());
        }

        self.entries.entry(key).or_insert_with(|| propagate(schema))
    }
}

impl<T, V> ShardingCache<T, V> {
    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that found nothing.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached result and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::{Arg, OpOverload, RuntimeSchemaInfo},
        sharding::{DeviceMeshBuilder, MeshDim, Placement, PlacementSpec},
    };
    use alloc::{collections::BTreeMap, sync::Arc, vec};

    fn transpose(dim0: i64, dim1: i64, placement: Placement) -> OpSchema<usize> {
        let mesh = DeviceMeshBuilder::new(vec![0, 1], [2])
            .with_dim(0, MeshDim::new("tp"))
            .build()
            .unwrap();
        let spec = PlacementSpec::new(Arc::new(mesh), [placement]);

        OpSchema::new(
            OpOverload::new("aten::transpose", "int"),
            vec![Arg::Tensor(spec), dim0.into(), dim1.into()],
            BTreeMap::new(),
        )
        .with_schema_info(RuntimeSchemaInfo::new(1))
    }

    #[test]
    fn identical_calls_hit_the_cache() {
        let mut cache = ShardingCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            cache.get_or_insert_with(&transpose(0, 1, Placement::Shard(0)), |_| {
                calls += 1;
                Placement::Shard(1)
            });
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn static_args_and_placements_split_entries() {
        let mut cache = ShardingCache::new();
        cache.insert(&transpose(0, 1, Placement::Shard(0)), "a");
        cache.insert(&transpose(1, 0, Placement::Shard(0)), "b");
        cache.insert(&transpose(0, 1, Placement::Replicate), "c");

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&transpose(1, 0, Placement::Shard(0))), Some(&"b"));
        assert_eq!(cache.get(&transpose(1, 1, Placement::Shard(0))), None);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
