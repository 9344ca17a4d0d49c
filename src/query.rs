// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query cache with live-updating archetype match lists.
//!
//! A query is an (include, exclude, any_of) mask triple. The engine caches
//! one entry per distinct triple; the same triple always resolves to the
//! same `QueryId` and the same match list, which stands in for the array
//! reference identity of the source design. Match lists grow monotonically
//! in archetype creation order and never shrink; iteration skips archetypes
//! that are transiently empty.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeRegistry};
use crate::bitset::BitSet;
use crate::component::{Column, ComponentId};
use crate::entity::EntityId;
use crate::error::Result;

/// Stable handle to a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

struct QueryEntry {
    include: BitSet,
    exclude: Option<BitSet>,
    any_of: Option<BitSet>,
    matches: Vec<ArchetypeId>,
}

impl QueryEntry {
    fn accepts(&self, mask: &BitSet) -> bool {
        mask.contains_all(&self.include)
            && self.exclude.as_ref().is_none_or(|e| !mask.overlaps(e))
            && self.any_of.as_ref().is_none_or(|a| mask.overlaps(a))
    }
}

/// Statistics about the query cache
#[derive(Debug, Clone, Copy)]
pub struct QueryCacheStats {
    /// Number of unique query triples cached
    pub num_cached_queries: usize,
    /// Total number of archetype matches across all cached queries
    pub total_cached_archetypes: usize,
    /// Total number of archetypes the cache has absorbed
    pub total_archetypes: usize,
}

/// Triple-keyed query cache.
pub struct QueryEngine {
    entries: Vec<QueryEntry>,
    /// mixed mask hash -> entry ids, resolved by mask equality
    buckets: AHashMap<u64, SmallVec<[u32; 2]>>,
    /// How many archetypes every entry has been checked against.
    seen_archetypes: usize,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            // Most apps settle on a small set of distinct queries
            buckets: AHashMap::with_capacity(32),
            seen_archetypes: 0,
        }
    }

    /// Resolve a triple to its cached entry, creating it on first request.
    pub fn get_or_insert(
        &mut self,
        include: BitSet,
        exclude: Option<BitSet>,
        any_of: Option<BitSet>,
        registry: &ArchetypeRegistry,
    ) -> QueryId {
        // Bring existing entries up to date first so a fresh seed and an
        // absorbed entry agree on what has been seen
        self.sync(registry);

        let hash = Self::triple_hash(&include, exclude.as_ref(), any_of.as_ref());
        if let Some(bucket) = self.buckets.get(&hash) {
            for &id in bucket {
                let entry = &self.entries[id as usize];
                if entry.include == include && entry.exclude == exclude && entry.any_of == any_of {
                    return QueryId(id);
                }
            }
        }

        let matches = registry.get_matching(&include, exclude.as_ref(), any_of.as_ref());
        let id = self.entries.len() as u32;
        self.entries.push(QueryEntry {
            include,
            exclude,
            any_of,
            matches,
        });
        self.buckets.entry(hash).or_default().push(id);
        QueryId(id)
    }

    /// Absorb archetypes created since the last sync into every entry.
    pub fn sync(&mut self, registry: &ArchetypeRegistry) {
        let count = registry.len();
        if count <= self.seen_archetypes {
            return;
        }
        for id in self.seen_archetypes..count {
            let mask = registry.archetypes()[id].mask();
            for entry in &mut self.entries {
                if entry.accepts(mask) {
                    entry.matches.push(id);
                }
            }
        }
        self.seen_archetypes = count;
    }

    /// Matched archetypes in creation order (may include empty ones).
    pub fn matches(&self, query: QueryId) -> &[ArchetypeId] {
        &self.entries[query.0 as usize].matches
    }

    /// The triple behind a cached query, for builder widening.
    pub(crate) fn masks(&self, query: QueryId) -> (&BitSet, Option<&BitSet>, Option<&BitSet>) {
        let entry = &self.entries[query.0 as usize];
        (&entry.include, entry.exclude.as_ref(), entry.any_of.as_ref())
    }

    /// Get query cache statistics for diagnostics
    pub fn stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            num_cached_queries: self.entries.len(),
            total_cached_archetypes: self.entries.iter().map(|e| e.matches.len()).sum(),
            total_archetypes: self.seen_archetypes,
        }
    }

    /// Mixed hash of the three mask hashes. Absent and present-but-empty
    /// filters hash differently.
    fn triple_hash(include: &BitSet, exclude: Option<&BitSet>, any_of: Option<&BitSet>) -> u64 {
        let mut hash = u64::from(include.hash32());
        for mask in [exclude, any_of] {
            let part = match mask {
                Some(m) => u64::from(m.hash32()) | (1 << 32),
                None => 0,
            };
            hash = hash.wrapping_mul(0x100_0000_01b3).wrapping_add(part);
        }
        hash
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable per-archetype view handed to chunk iteration callbacks.
///
/// Column references obtained through this view are invalidated by any
/// structural mutation of the archetype.
pub struct ArchetypeChunkMut<'a> {
    archetype: &'a mut Archetype,
}

impl<'a> ArchetypeChunkMut<'a> {
    pub(crate) fn new(archetype: &'a mut Archetype) -> Self {
        Self { archetype }
    }

    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype.id()
    }

    /// Row count of this chunk.
    pub fn len(&self) -> usize {
        self.archetype.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetype.is_empty()
    }

    pub fn entity_ids(&self) -> &[EntityId] {
        self.archetype.entity_ids()
    }

    pub fn entity(&self, row: usize) -> Option<EntityId> {
        self.archetype.entity_at(row)
    }

    /// Read one field at `row`, widened to f64.
    pub fn get(&self, component: ComponentId, field: usize, row: usize) -> Result<f64> {
        self.archetype.get_value(component, field, row)
    }

    /// Write one field at `row`, narrowing from f64.
    pub fn set(&mut self, component: ComponentId, field: usize, row: usize, value: f64) -> Result<()> {
        self.archetype.set_value(component, field, row, value)
    }

    /// Typed column access for slice-oriented loops.
    pub fn column(&self, component: ComponentId, field: usize) -> Result<&Column> {
        self.archetype.column(component, field)
    }

    pub fn column_mut(&mut self, component: ComponentId, field: usize) -> Result<&mut Column> {
        self.archetype.column_mut(component, field)
    }

    /// One writable and one readable column at the same time.
    pub fn column_pair_mut(
        &mut self,
        write: (ComponentId, usize),
        read: (ComponentId, usize),
    ) -> Result<(&mut Column, &Column)> {
        self.archetype.column_pair_mut(write, read)
    }
}
