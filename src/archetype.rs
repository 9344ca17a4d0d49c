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

//! Archetype storage and the deduplicating archetype registry.
//!
//! An archetype is one component-set bucket: a sorted signature, dense
//! row-aligned columns (one per field of each component), and a sparse-set
//! membership map from entity slot to row. Removal is swap-and-pop across
//! every column at once. The registry deduplicates archetypes by signature
//! hash, maintains the component-to-archetype index used by query matching,
//! and caches add/remove transitions bidirectionally.

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::bitset::BitSet;
use crate::component::{Column, ComponentId, ComponentRegistry};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// Dense archetype identifier.
pub type ArchetypeId = usize;

/// The empty archetype every entity starts in. Always id 0.
pub const EMPTY_ARCHETYPE: ArchetypeId = 0;

const INITIAL_ROW_CAPACITY: usize = 16;
const INITIAL_SPARSE_CAPACITY: usize = 64;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over the component IDs of a sorted signature.
pub fn signature_hash(signature: &[ComponentId]) -> u32 {
    let mut hash = FNV_OFFSET;
    for component in signature {
        for byte in component.0.to_le_bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Cached add/remove transition targets for one component.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypeEdge {
    pub add: Option<ArchetypeId>,
    pub remove: Option<ArchetypeId>,
}

/// Archetype: Structure of Arrays storage for one component set
pub struct Archetype {
    id: ArchetypeId,
    /// Sorted component IDs, immutable after construction.
    signature: Vec<ComponentId>,
    mask: BitSet,
    entity_ids: Vec<EntityId>,
    /// Sparse map entity_slot -> row, -1 for absent.
    index_to_row: Vec<i32>,
    /// Flat columns, grouped per component in signature order.
    columns: Vec<Column>,
    /// Start of each component's column group in `columns`.
    offsets: Vec<usize>,
    edges: FxHashMap<ComponentId, ArchetypeEdge>,
}

impl Archetype {
    /// Create an empty archetype for a pre-sorted signature.
    pub fn new(
        id: ArchetypeId,
        signature: Vec<ComponentId>,
        components: &ComponentRegistry,
    ) -> Result<Self> {
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));

        let mut mask = BitSet::default();
        let mut columns = Vec::new();
        let mut offsets = Vec::with_capacity(signature.len());
        for &component in &signature {
            let schema = components.schema(component)?;
            mask.set(component.index());
            offsets.push(columns.len());
            for field in schema.fields() {
                columns.push(Column::with_capacity(field.ty, INITIAL_ROW_CAPACITY));
            }
        }

        Ok(Self {
            id,
            signature,
            mask,
            entity_ids: Vec::with_capacity(INITIAL_ROW_CAPACITY),
            index_to_row: vec![-1; INITIAL_SPARSE_CAPACITY],
            columns,
            offsets,
            edges: FxHashMap::default(),
        })
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Get signature
    pub fn signature(&self) -> &[ComponentId] {
        &self.signature
    }

    pub fn mask(&self) -> &BitSet {
        &self.mask
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    /// Get all entities
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    pub fn entity_at(&self, row: usize) -> Option<EntityId> {
        self.entity_ids.get(row).copied()
    }

    /// Row of the entity occupying `slot`, if present.
    pub fn row_of(&self, slot: u32) -> Option<usize> {
        match self.index_to_row.get(slot as usize) {
            Some(&row) if row >= 0 => Some(row as usize),
            _ => None,
        }
    }

    /// Position of a component in the signature (binary search).
    pub fn position_of(&self, component: ComponentId) -> Option<usize> {
        self.signature.binary_search(&component).ok()
    }

    pub fn has_component(&self, component: ComponentId) -> bool {
        self.position_of(component).is_some()
    }

    /// True if every required component is in the signature.
    pub fn matches(&self, required: &[ComponentId]) -> bool {
        required.iter().all(|&c| self.has_component(c))
    }

    /// Allocate a row for `id` and zero its columns.
    pub fn add_entity(&mut self, id: EntityId) -> usize {
        let slot = id.slot() as usize;
        if slot >= self.index_to_row.len() {
            let grown = (self.index_to_row.len() * 2).max(slot + 1);
            self.index_to_row.resize(grown, -1);
        }

        let row = self.entity_ids.len();
        self.entity_ids.push(id);
        for column in &mut self.columns {
            column.push_default();
        }
        self.index_to_row[slot] = row as i32;
        row
    }

    /// Swap-and-pop the row owned by `slot` across every column.
    ///
    /// Returns the slot of the entity that was moved into the vacated row,
    /// if any; its `index_to_row` entry is already updated.
    pub fn remove_entity(&mut self, slot: u32) -> Result<Option<u32>> {
        let row = self.row_of(slot).ok_or(EcsError::NotInArchetype)?;
        let last = self.entity_ids.len() - 1;

        self.index_to_row[slot as usize] = -1;
        self.entity_ids.swap_remove(row);
        for column in &mut self.columns {
            column.swap_remove(row);
        }

        if row != last {
            let moved = self.entity_ids[row];
            self.index_to_row[moved.slot() as usize] = row as i32;
            Ok(Some(moved.slot()))
        } else {
            Ok(None)
        }
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entity_ids.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Get column immutably
    pub fn column(&self, component: ComponentId, field: usize) -> Result<&Column> {
        let index = self.flat_index(component, field)?;
        Ok(&self.columns[index])
    }

    /// Get column mutably
    pub fn column_mut(&mut self, component: ComponentId, field: usize) -> Result<&mut Column> {
        let index = self.flat_index(component, field)?;
        Ok(&mut self.columns[index])
    }

    /// Borrow one column mutably and another immutably at the same time.
    ///
    /// Requesting the same column for both sides is rejected.
    pub fn column_pair_mut(
        &mut self,
        write: (ComponentId, usize),
        read: (ComponentId, usize),
    ) -> Result<(&mut Column, &Column)> {
        let w = self.flat_index(write.0, write.1)?;
        let r = self.flat_index(read.0, read.1)?;
        match w.cmp(&r) {
            std::cmp::Ordering::Less => {
                let (left, right) = self.columns.split_at_mut(r);
                Ok((&mut left[w], &right[0]))
            }
            std::cmp::Ordering::Greater => {
                let (left, right) = self.columns.split_at_mut(w);
                Ok((&mut right[0], &left[r]))
            }
            std::cmp::Ordering::Equal => Err(EcsError::FieldOutOfBounds {
                component: read.0,
                field: read.1,
            }),
        }
    }

    /// Read one field value at `row`, widened to f64.
    pub fn get_value(&self, component: ComponentId, field: usize, row: usize) -> Result<f64> {
        Ok(self.column(component, field)?.get(row))
    }

    /// Write one field value at `row`, narrowing from f64.
    pub fn set_value(
        &mut self,
        component: ComponentId,
        field: usize,
        row: usize,
        value: f64,
    ) -> Result<()> {
        self.column_mut(component, field)?.set(row, value);
        Ok(())
    }

    /// Write all fields of the component at signature position `pos`.
    /// Missing values default to zero.
    pub(crate) fn set_component_row(&mut self, pos: usize, row: usize, values: &[f64]) {
        let start = self.offsets[pos];
        for field in 0..self.field_count(pos) {
            let value = values.get(field).copied().unwrap_or(0.0);
            self.columns[start + field].set(row, value);
        }
    }

    /// Record membership for an entity whose column rows were appended in
    /// bulk (batch moves).
    pub(crate) fn record_entity(&mut self, id: EntityId) {
        let slot = id.slot() as usize;
        if slot >= self.index_to_row.len() {
            let grown = (self.index_to_row.len() * 2).max(slot + 1);
            self.index_to_row.resize(grown, -1);
        }
        let row = self.entity_ids.len();
        self.entity_ids.push(id);
        self.index_to_row[slot] = row as i32;
        debug_assert!(self.columns.iter().all(|c| c.len() > row));
    }

    /// Drop every row after a bulk move-out. The archetype stays registered.
    pub(crate) fn clear_entities(&mut self) {
        for id in &self.entity_ids {
            self.index_to_row[id.slot() as usize] = -1;
        }
        self.entity_ids.clear();
        for column in &mut self.columns {
            column.truncate(0);
        }
    }

    /// Cached transition targets for `component`.
    pub fn get_edge(&self, component: ComponentId) -> Option<ArchetypeEdge> {
        self.edges.get(&component).copied()
    }

    pub(crate) fn set_edge_add(&mut self, component: ComponentId, target: ArchetypeId) {
        self.edges.entry(component).or_default().add = Some(target);
    }

    pub(crate) fn set_edge_remove(&mut self, component: ComponentId, target: ArchetypeId) {
        self.edges.entry(component).or_default().remove = Some(target);
    }

    fn field_count(&self, pos: usize) -> usize {
        let end = self
            .offsets
            .get(pos + 1)
            .copied()
            .unwrap_or(self.columns.len());
        end - self.offsets[pos]
    }

    fn flat_index(&self, component: ComponentId, field: usize) -> Result<usize> {
        let pos = self
            .position_of(component)
            .ok_or(EcsError::ComponentNotFound)?;
        if field >= self.field_count(pos) {
            return Err(EcsError::FieldOutOfBounds { component, field });
        }
        Ok(self.offsets[pos] + field)
    }
}

/// Copy one row's values for every component shared by `src` and `dst`.
///
/// Merge walk over the two sorted signatures; the destination row must
/// already exist.
pub(crate) fn copy_shared_row(src: &Archetype, src_row: usize, dst: &mut Archetype, dst_row: usize) {
    let (mut i, mut j) = (0, 0);
    while i < src.signature.len() && j < dst.signature.len() {
        match src.signature[i].cmp(&dst.signature[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let fields = src.field_count(i);
                debug_assert_eq!(fields, dst.field_count(j));
                for field in 0..fields {
                    let src_col = &src.columns[src.offsets[i] + field];
                    dst.columns[dst.offsets[j] + field].copy_from(src_col, src_row, dst_row);
                }
                i += 1;
                j += 1;
            }
        }
    }
}

/// Bulk-append the first `count` rows of every shared column of `src` onto
/// `dst` (batch archetype-to-archetype move).
pub(crate) fn append_shared_columns(src: &Archetype, dst: &mut Archetype, count: usize) {
    let (mut i, mut j) = (0, 0);
    while i < src.signature.len() && j < dst.signature.len() {
        match src.signature[i].cmp(&dst.signature[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let fields = src.field_count(i);
                for field in 0..fields {
                    let src_col = &src.columns[src.offsets[i] + field];
                    dst.columns[dst.offsets[j] + field].append_from(src_col, count);
                }
                i += 1;
                j += 1;
            }
        }
    }
}

/// Broadcast one component's field values over `count` appended rows.
pub(crate) fn broadcast_component(
    dst: &mut Archetype,
    pos: usize,
    values: &[f64],
    count: usize,
) {
    let start = dst.offsets[pos];
    for field in 0..dst.field_count(pos) {
        let value = values.get(field).copied().unwrap_or(0.0);
        dst.columns[start + field].extend_value(value, count);
    }
}

/// Deduplicating archetype store and transition graph.
pub struct ArchetypeRegistry {
    archetypes: Vec<Archetype>,
    /// signature hash -> archetype ids with that hash
    buckets: AHashMap<u32, SmallVec<[ArchetypeId; 2]>>,
    /// component id -> archetypes whose signature contains it
    component_index: Vec<Vec<ArchetypeId>>,
}

impl ArchetypeRegistry {
    /// Create the registry with the empty archetype bootstrapped at id 0.
    pub fn new(components: &ComponentRegistry) -> Self {
        let mut registry = Self {
            archetypes: Vec::with_capacity(64),
            buckets: AHashMap::with_capacity(64),
            component_index: Vec::new(),
        };
        // Empty signature cannot fail: no schema lookups happen
        let id = registry
            .get_or_create(Vec::new(), components)
            .unwrap_or(EMPTY_ARCHETYPE);
        debug_assert_eq!(id, EMPTY_ARCHETYPE);
        registry
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    pub fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id)
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Archetypes whose signature contains `component`.
    pub fn component_archetypes(&self, component: ComponentId) -> &[ArchetypeId] {
        self.component_index
            .get(component.index())
            .map_or(&[], |v| v.as_slice())
    }

    /// Mutable access to two distinct archetypes at once.
    pub(crate) fn pair_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        debug_assert_ne!(a, b);
        if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Find or create the archetype for a pre-sorted signature.
    pub fn get_or_create(
        &mut self,
        signature: Vec<ComponentId>,
        components: &ComponentRegistry,
    ) -> Result<ArchetypeId> {
        let hash = signature_hash(&signature);
        if let Some(bucket) = self.buckets.get(&hash) {
            for &id in bucket {
                if self.archetypes[id].signature() == signature.as_slice() {
                    return Ok(id);
                }
            }
        }

        let id = self.archetypes.len();
        let archetype = Archetype::new(id, signature, components)?;
        for &component in archetype.signature() {
            let index = component.index();
            if index >= self.component_index.len() {
                self.component_index.resize_with(index + 1, Vec::new);
            }
            self.component_index[index].push(id);
        }
        self.archetypes.push(archetype);
        self.buckets.entry(hash).or_default().push(id);
        Ok(id)
    }

    /// Archetype reached from `from` by adding `component`.
    ///
    /// Caches the transition edge bidirectionally on first resolution.
    pub fn resolve_add(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        components: &ComponentRegistry,
    ) -> Result<ArchetypeId> {
        let source = self.archetypes.get(from).ok_or(EcsError::ArchetypeNotFound)?;
        if source.has_component(component) {
            return Ok(from);
        }
        if let Some(edge) = source.get_edge(component) {
            if let Some(target) = edge.add {
                return Ok(target);
            }
        }

        let mut signature = source.signature().to_vec();
        let at = signature.partition_point(|&c| c < component);
        signature.insert(at, component);

        let target = self.get_or_create(signature, components)?;
        self.archetypes[from].set_edge_add(component, target);
        self.archetypes[target].set_edge_remove(component, from);
        Ok(target)
    }

    /// Archetype reached from `from` by removing `component`.
    pub fn resolve_remove(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        components: &ComponentRegistry,
    ) -> Result<ArchetypeId> {
        let source = self.archetypes.get(from).ok_or(EcsError::ArchetypeNotFound)?;
        if !source.has_component(component) {
            return Ok(from);
        }
        if let Some(edge) = source.get_edge(component) {
            if let Some(target) = edge.remove {
                return Ok(target);
            }
        }

        let mut signature = source.signature().to_vec();
        signature.retain(|&c| c != component);

        let target = self.get_or_create(signature, components)?;
        self.archetypes[from].set_edge_remove(component, target);
        self.archetypes[target].set_edge_add(component, from);
        Ok(target)
    }

    /// All archetypes satisfying an (include, exclude, any_of) mask triple.
    ///
    /// Candidates come from the smallest component-index set named by
    /// `include`; an empty include mask makes every archetype a candidate.
    pub fn get_matching(
        &self,
        include: &BitSet,
        exclude: Option<&BitSet>,
        any_of: Option<&BitSet>,
    ) -> Vec<ArchetypeId> {
        let mut narrowest: Option<&Vec<ArchetypeId>> = None;
        if !include.is_empty() {
            for component in include.ones() {
                match self.component_index.get(component) {
                    None => return Vec::new(),
                    Some(list) => {
                        if list.is_empty() {
                            return Vec::new();
                        }
                        if narrowest.is_none_or(|best| list.len() < best.len()) {
                            narrowest = Some(list);
                        }
                    }
                }
            }
        }

        let matches_triple = |id: ArchetypeId| {
            let mask = self.archetypes[id].mask();
            mask.contains_all(include)
                && exclude.is_none_or(|e| !mask.overlaps(e))
                && any_of.is_none_or(|a| mask.overlaps(a))
        };

        match narrowest {
            Some(candidates) => candidates.iter().copied().filter(|&id| matches_triple(id)).collect(),
            None => (0..self.archetypes.len()).filter(|&id| matches_triple(id)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentSchema, FieldType};

    fn setup() -> (ComponentRegistry, ArchetypeRegistry) {
        let mut components = ComponentRegistry::new();
        components.register(
            ComponentSchema::new("Position")
                .field("x", FieldType::F64)
                .field("y", FieldType::F64),
        );
        components.register(
            ComponentSchema::new("Velocity")
                .field("vx", FieldType::F64)
                .field("vy", FieldType::F64),
        );
        components.register_tag("Frozen");
        let archetypes = ArchetypeRegistry::new(&components);
        (components, archetypes)
    }

    #[test]
    fn test_empty_archetype_bootstrapped() {
        let (_, registry) = setup();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(EMPTY_ARCHETYPE).unwrap().signature().is_empty());
    }

    #[test]
    fn test_get_or_create_dedups() -> Result<()> {
        let (components, mut registry) = setup();
        let sig = vec![ComponentId(0), ComponentId(1)];
        let a = registry.get_or_create(sig.clone(), &components)?;
        let b = registry.get_or_create(sig, &components)?;
        assert_eq!(a, b);
        assert_eq!(registry.len(), 2);
        Ok(())
    }

    #[test]
    fn test_component_index_maintained() -> Result<()> {
        let (components, mut registry) = setup();
        let pos_only = registry.get_or_create(vec![ComponentId(0)], &components)?;
        let both = registry.get_or_create(vec![ComponentId(0), ComponentId(1)], &components)?;

        assert_eq!(registry.component_archetypes(ComponentId(0)), &[pos_only, both]);
        assert_eq!(registry.component_archetypes(ComponentId(1)), &[both]);
        Ok(())
    }

    #[test]
    fn test_resolve_add_caches_bidirectional_edge() -> Result<()> {
        let (components, mut registry) = setup();
        let target = registry.resolve_add(EMPTY_ARCHETYPE, ComponentId(0), &components)?;
        assert_ne!(target, EMPTY_ARCHETYPE);

        let empty_edge = registry.get(EMPTY_ARCHETYPE).unwrap().get_edge(ComponentId(0)).unwrap();
        assert_eq!(empty_edge.add, Some(target));
        let back_edge = registry.get(target).unwrap().get_edge(ComponentId(0)).unwrap();
        assert_eq!(back_edge.remove, Some(EMPTY_ARCHETYPE));

        // Second resolution hits the cache
        assert_eq!(
            registry.resolve_add(EMPTY_ARCHETYPE, ComponentId(0), &components)?,
            target
        );
        // Adding a component that is already present is the identity
        assert_eq!(registry.resolve_add(target, ComponentId(0), &components)?, target);
        Ok(())
    }

    #[test]
    fn test_resolve_remove_roundtrip() -> Result<()> {
        let (components, mut registry) = setup();
        let with_pos = registry.resolve_add(EMPTY_ARCHETYPE, ComponentId(0), &components)?;
        let without = registry.resolve_remove(with_pos, ComponentId(0), &components)?;
        assert_eq!(without, EMPTY_ARCHETYPE);
        // Removing an absent component is the identity
        assert_eq!(registry.resolve_remove(EMPTY_ARCHETYPE, ComponentId(1), &components)?, EMPTY_ARCHETYPE);
        Ok(())
    }

    #[test]
    fn test_add_remove_entity_swap_and_pop() -> Result<()> {
        let (components, mut registry) = setup();
        let id = registry.get_or_create(vec![ComponentId(0)], &components)?;
        let arch = registry.get_mut(id).unwrap();

        let e0 = EntityId::from_parts(0, 0);
        let e1 = EntityId::from_parts(1, 0);
        let e2 = EntityId::from_parts(2, 0);
        for (i, e) in [e0, e1, e2].into_iter().enumerate() {
            let row = arch.add_entity(e);
            assert_eq!(row, i);
            arch.set_component_row(0, row, &[i as f64, -(i as f64)]);
        }

        // Remove the head row: tail entity swaps in
        let swapped = arch.remove_entity(0)?;
        assert_eq!(swapped, Some(2));
        assert_eq!(arch.len(), 2);
        assert_eq!(arch.row_of(2), Some(0));
        assert_eq!(arch.get_value(ComponentId(0), 0, 0)?, 2.0);
        assert_eq!(arch.get_value(ComponentId(0), 1, 0)?, -2.0);
        assert_eq!(arch.get_value(ComponentId(0), 0, 1)?, 1.0);

        // Remove the tail row: nothing swaps
        assert_eq!(arch.remove_entity(1)?, None);
        assert_eq!(arch.remove_entity(1), Err(EcsError::NotInArchetype));
        Ok(())
    }

    #[test]
    fn test_growth_preserves_rows() -> Result<()> {
        let (components, mut registry) = setup();
        let id = registry.get_or_create(vec![ComponentId(0)], &components)?;
        let arch = registry.get_mut(id).unwrap();

        // Push well past the initial dense and sparse capacities
        for i in 0..200u32 {
            let row = arch.add_entity(EntityId::from_parts(i, 0));
            arch.set_component_row(0, row, &[f64::from(i), f64::from(i) * 0.5]);
        }
        for i in 0..200u32 {
            let row = arch.row_of(i).unwrap();
            assert_eq!(arch.get_value(ComponentId(0), 0, row)?, f64::from(i));
            assert_eq!(arch.get_value(ComponentId(0), 1, row)?, f64::from(i) * 0.5);
        }
        Ok(())
    }

    #[test]
    fn test_get_matching_filters() -> Result<()> {
        let (components, mut registry) = setup();
        let pos_only = registry.get_or_create(vec![ComponentId(0)], &components)?;
        let pos_vel = registry.get_or_create(vec![ComponentId(0), ComponentId(1)], &components)?;
        let pos_frozen = registry.get_or_create(vec![ComponentId(0), ComponentId(2)], &components)?;

        let mut include = BitSet::default();
        include.set(0);
        assert_eq!(registry.get_matching(&include, None, None), vec![pos_only, pos_vel, pos_frozen]);

        let mut exclude = BitSet::default();
        exclude.set(2);
        assert_eq!(registry.get_matching(&include, Some(&exclude), None), vec![pos_only, pos_vel]);

        let mut any_of = BitSet::default();
        any_of.set(1);
        any_of.set(2);
        assert_eq!(
            registry.get_matching(&include, None, Some(&any_of)),
            vec![pos_vel, pos_frozen]
        );

        // Empty include matches everything, the empty archetype included
        let all = registry.get_matching(&BitSet::default(), None, None);
        assert_eq!(all.len(), 4);

        // Component that never reached an archetype
        let mut unseen = BitSet::default();
        unseen.set(3);
        assert!(registry.get_matching(&unseen, None, None).is_empty());
        Ok(())
    }

    #[test]
    fn test_signature_queries() -> Result<()> {
        let (components, mut registry) = setup();
        let id = registry.get_or_create(vec![ComponentId(0), ComponentId(2)], &components)?;
        let arch = registry.get(id).unwrap();

        assert!(arch.has_component(ComponentId(0)));
        assert!(!arch.has_component(ComponentId(1)));
        assert!(arch.matches(&[ComponentId(0)]));
        assert!(arch.matches(&[ComponentId(0), ComponentId(2)]));
        assert!(!arch.matches(&[ComponentId(0), ComponentId(1)]));
        assert!(arch.mask().has(2));
        Ok(())
    }

    #[test]
    fn test_column_pair_mut_disjoint() -> Result<()> {
        let (components, mut registry) = setup();
        let id = registry.get_or_create(vec![ComponentId(0), ComponentId(1)], &components)?;
        let arch = registry.get_mut(id).unwrap();
        let row = arch.add_entity(EntityId::from_parts(0, 0));
        arch.set_value(ComponentId(1), 0, row, 4.0)?;

        let (pos_x, vel_x) = arch.column_pair_mut((ComponentId(0), 0), (ComponentId(1), 0))?;
        pos_x.set(row, vel_x.get(row) * 2.0);
        assert_eq!(arch.get_value(ComponentId(0), 0, row)?, 8.0);

        assert!(arch
            .column_pair_mut((ComponentId(0), 0), (ComponentId(0), 0))
            .is_err());
        Ok(())
    }
}
