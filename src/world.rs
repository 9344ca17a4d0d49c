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

//! World: central entity and archetype storage
//!
//! The World owns the allocator, both registries, the query cache, and the
//! deferred command buffer, and routes every structural change. Immediate
//! structural mutation is for code running outside a system; systems go
//! through `SystemContext`, which defers onto the command buffer until the
//! phase boundary flush.

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{
    append_shared_columns, broadcast_component, copy_shared_row, Archetype, ArchetypeId,
    ArchetypeRegistry, EMPTY_ARCHETYPE,
};
use crate::bitset::BitSet;
use crate::command::CommandBuffer;
use crate::component::{ComponentId, ComponentRegistry, ComponentSchema};
use crate::entity::{EntityAllocator, EntityId};
use crate::error::{EcsError, Result};
use crate::query::{ArchetypeChunkMut, QueryCacheStats, QueryEngine, QueryId};

/// Central ECS world
pub struct World {
    entities: EntityAllocator,
    components: ComponentRegistry,
    archetypes: ArchetypeRegistry,
    queries: QueryEngine,

    /// Sparse map entity_slot -> archetype id, grows with slots
    entity_archetype: Vec<ArchetypeId>,

    /// Deferred structural mutations and despawns
    commands: CommandBuffer,
}

impl World {
    /// Create a new, empty world.
    ///
    /// The empty archetype (entities with no components) is bootstrapped at
    /// id 0, which simplifies logic elsewhere.
    pub fn new() -> Self {
        let components = ComponentRegistry::new();
        let archetypes = ArchetypeRegistry::new(&components);
        Self {
            entities: EntityAllocator::new(),
            components,
            archetypes,
            queries: QueryEngine::new(),
            entity_archetype: Vec::with_capacity(64),
            commands: CommandBuffer::new(),
        }
    }

    // ========== Component registration ==========

    /// Register a component schema, returning its dense handle.
    pub fn register_component(&mut self, schema: ComponentSchema) -> ComponentId {
        self.components.register(schema)
    }

    /// Register a tag component (empty schema).
    pub fn register_tag(&mut self, name: impl Into<String>) -> ComponentId {
        self.components.register_tag(name)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn schema(&self, component: ComponentId) -> Result<&ComponentSchema> {
        self.components.schema(component)
    }

    // ========== Entity lifecycle ==========

    /// Spawn an entity with no components (it lands in the empty archetype).
    pub fn spawn_empty(&mut self) -> Result<EntityId> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.spawn_empty", live = self.entities.live_count());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let id = self.entities.create()?;
        let slot = id.slot() as usize;
        if slot >= self.entity_archetype.len() {
            let grown = (self.entity_archetype.len() * 2).max(slot + 1).max(64);
            self.entity_archetype.resize(grown, EMPTY_ARCHETYPE);
        }
        self.entity_archetype[slot] = EMPTY_ARCHETYPE;
        self.archetypes
            .get_mut(EMPTY_ARCHETYPE)
            .ok_or(EcsError::ArchetypeNotFound)?
            .add_entity(id);
        Ok(id)
    }

    /// Despawn entity immediately
    ///
    /// Removes the entity from its archetype (swap-and-pop) and poisons its
    /// staging columns. Fails with `DoubleDespawn` if it is not alive.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(EcsError::DoubleDespawn);
        }
        let (archetype_id, _) = self.location(entity)?;
        let slot = entity.slot();

        let archetype = self
            .archetypes
            .get_mut(archetype_id)
            .ok_or(EcsError::ArchetypeNotFound)?;
        archetype.remove_entity(slot)?;
        let signature = archetype.signature().to_vec();
        for component in signature {
            self.components.clear(component, slot);
        }
        self.entities.destroy(entity)
    }

    /// Despawn entity (deferred - queued until the next flush)
    pub fn despawn_deferred(&mut self, entity: EntityId) {
        self.commands.despawn(entity);
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> u32 {
        self.entities.live_count()
    }

    pub fn recycled_entity_count(&self) -> u64 {
        self.entities.recycled_count()
    }

    // ========== Component access ==========

    /// Check if entity has a specific component
    pub fn has_component(&self, entity: EntityId, component: ComponentId) -> Result<bool> {
        if !self.components.contains(component) {
            return Err(EcsError::ComponentNotFound);
        }
        let (archetype_id, _) = self.location(entity)?;
        Ok(self.archetypes.get(archetype_id).is_some_and(|a| a.has_component(component)))
    }

    /// Add a component to an entity, moving it across archetypes.
    ///
    /// Missing field values default to zero. If the entity already has the
    /// component, its fields are overwritten in place and no move happens.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        values: &[f64],
    ) -> Result<()> {
        let (from, row) = self.location(entity)?;
        let slot = entity.slot();

        // Stage values in the slot-indexed registry columns; this also
        // validates the component handle
        self.components.set(component, slot, values)?;

        let source = self
            .archetypes
            .get_mut(from)
            .ok_or(EcsError::ArchetypeNotFound)?;
        if let Some(pos) = source.position_of(component) {
            source.set_component_row(pos, row, values);
            return Ok(());
        }

        let target = self.archetypes.resolve_add(from, component, &self.components)?;
        self.queries.sync(&self.archetypes);

        let new_row = self.move_entity(entity, from, target)?;
        let destination = self
            .archetypes
            .get_mut(target)
            .ok_or(EcsError::ArchetypeNotFound)?;
        if let Some(pos) = destination.position_of(component) {
            destination.set_component_row(pos, new_row, values);
        }
        self.entity_archetype[slot as usize] = target;
        Ok(())
    }

    /// Add several components with a single archetype move.
    pub fn add_components(
        &mut self,
        entity: EntityId,
        components: &[(ComponentId, &[f64])],
    ) -> Result<()> {
        let (from, row) = self.location(entity)?;
        let slot = entity.slot();

        let mut signature = self
            .archetypes
            .get(from)
            .ok_or(EcsError::ArchetypeNotFound)?
            .signature()
            .to_vec();
        for &(component, values) in components {
            self.components.set(component, slot, values)?;
            if let Err(at) = signature.binary_search(&component) {
                signature.insert(at, component);
            }
        }

        let target = self.archetypes.get_or_create(signature, &self.components)?;
        self.queries.sync(&self.archetypes);

        let new_row = if target == from {
            row
        } else {
            let moved_to = self.move_entity(entity, from, target)?;
            self.entity_archetype[slot as usize] = target;
            moved_to
        };

        let destination = self
            .archetypes
            .get_mut(target)
            .ok_or(EcsError::ArchetypeNotFound)?;
        for &(component, values) in components {
            if let Some(pos) = destination.position_of(component) {
                destination.set_component_row(pos, new_row, values);
            }
        }
        Ok(())
    }

    /// Remove a component from an entity. Absent components are a no-op.
    pub fn remove_component(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        if !self.components.contains(component) {
            return Err(EcsError::ComponentNotFound);
        }
        let (from, _) = self.location(entity)?;
        let slot = entity.slot();

        let source = self.archetypes.get(from).ok_or(EcsError::ArchetypeNotFound)?;
        if !source.has_component(component) {
            return Ok(());
        }

        let target = self
            .archetypes
            .resolve_remove(from, component, &self.components)?;
        self.queries.sync(&self.archetypes);

        self.move_entity(entity, from, target)?;
        self.entity_archetype[slot as usize] = target;
        Ok(())
    }

    /// Remove several components with a single archetype move.
    pub fn remove_components(&mut self, entity: EntityId, components: &[ComponentId]) -> Result<()> {
        for &component in components {
            if !self.components.contains(component) {
                return Err(EcsError::ComponentNotFound);
            }
        }
        let (from, _) = self.location(entity)?;
        let slot = entity.slot();

        let source = self.archetypes.get(from).ok_or(EcsError::ArchetypeNotFound)?;
        let signature: Vec<ComponentId> = source
            .signature()
            .iter()
            .copied()
            .filter(|c| !components.contains(c))
            .collect();
        if signature.len() == source.signature().len() {
            return Ok(());
        }

        let target = self.archetypes.get_or_create(signature, &self.components)?;
        self.queries.sync(&self.archetypes);

        self.move_entity(entity, from, target)?;
        self.entity_archetype[slot as usize] = target;
        Ok(())
    }

    /// Read one field of a component on an entity, widened to f64.
    pub fn get_field(&self, entity: EntityId, component: ComponentId, field: usize) -> Result<f64> {
        let (archetype_id, row) = self.location(entity)?;
        self.archetypes
            .get(archetype_id)
            .ok_or(EcsError::ArchetypeNotFound)?
            .get_value(component, field, row)
    }

    /// Write one field of a component on an entity, narrowing from f64.
    pub fn set_field(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        field: usize,
        value: f64,
    ) -> Result<()> {
        let (archetype_id, row) = self.location(entity)?;
        self.archetypes
            .get_mut(archetype_id)
            .ok_or(EcsError::ArchetypeNotFound)?
            .set_value(component, field, row, value)
    }

    // ========== Deferred operations ==========

    /// Queue a component add for the next flush, capturing the values now.
    pub fn add_component_deferred(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        values: &[f64],
    ) {
        self.commands.add_component(entity, component, values);
    }

    /// Queue a component remove for the next flush.
    pub fn remove_component_deferred(&mut self, entity: EntityId, component: ComponentId) {
        self.commands.remove_component(entity, component);
    }

    /// Apply deferred structural changes, then deferred despawns.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_structural()?;
        self.flush_despawned()
    }

    /// Apply deferred structural changes: every queued add first, then
    /// every queued remove, each group in insertion order. Entries whose
    /// entity has died since queueing are silently skipped.
    pub fn flush_structural(&mut self) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.flush_structural", queued = self.commands.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let adds = self.commands.take_adds();
        for command in adds {
            if self.is_alive(command.entity) {
                self.add_component(command.entity, command.component, &command.values)?;
            }
        }

        let removes = self.commands.take_removes();
        for command in removes {
            if self.is_alive(command.entity) {
                self.remove_component(command.entity, command.component)?;
            }
        }
        Ok(())
    }

    /// Apply deferred despawns. Already-dead entries are skipped, so a
    /// double deferred despawn is safe.
    pub fn flush_despawned(&mut self) -> Result<()> {
        let despawns = self.commands.take_despawns();
        for entity in despawns {
            if self.is_alive(entity) {
                self.despawn(entity)?;
            }
        }
        Ok(())
    }

    /// Number of queued deferred operations awaiting a flush.
    pub fn pending_command_count(&self) -> usize {
        self.commands.len()
    }

    // ========== Batch archetype moves ==========

    /// Move every entity of `source` to the archetype reached by adding
    /// `component`, broadcasting one set of field values over the moved
    /// rows. A source that already has the component is a no-op. The source
    /// stays registered even when it empties.
    pub fn batch_add_component(
        &mut self,
        source: ArchetypeId,
        component: ComponentId,
        values: &[f64],
    ) -> Result<()> {
        if !self.components.contains(component) {
            return Err(EcsError::ComponentNotFound);
        }
        let archetype = self.archetypes.get(source).ok_or(EcsError::ArchetypeNotFound)?;
        if archetype.has_component(component) {
            return Ok(());
        }

        let target = self
            .archetypes
            .resolve_add(source, component, &self.components)?;
        self.queries.sync(&self.archetypes);
        self.batch_move(source, target, Some((component, values)))
    }

    /// Move every entity of `source` to the archetype reached by removing
    /// `component`. A source without the component is a no-op.
    pub fn batch_remove_component(
        &mut self,
        source: ArchetypeId,
        component: ComponentId,
    ) -> Result<()> {
        if !self.components.contains(component) {
            return Err(EcsError::ComponentNotFound);
        }
        let archetype = self.archetypes.get(source).ok_or(EcsError::ArchetypeNotFound)?;
        if !archetype.has_component(component) {
            return Ok(());
        }

        let target = self
            .archetypes
            .resolve_remove(source, component, &self.components)?;
        self.queries.sync(&self.archetypes);
        self.batch_move(source, target, None)
    }

    fn batch_move(
        &mut self,
        source: ArchetypeId,
        target: ArchetypeId,
        broadcast: Option<(ComponentId, &[f64])>,
    ) -> Result<()> {
        let moved = {
            let (src, dst) = self.archetypes.pair_mut(source, target);
            let count = src.len();
            if count == 0 {
                return Ok(());
            }

            dst.reserve_rows(count);
            append_shared_columns(src, dst, count);
            if let Some((component, values)) = broadcast {
                let pos = dst
                    .position_of(component)
                    .ok_or(EcsError::ComponentNotFound)?;
                broadcast_component(dst, pos, values, count);
            }

            let moved = src.entity_ids().to_vec();
            for &entity in &moved {
                dst.record_entity(entity);
            }
            src.clear_entities();
            moved
        };

        for entity in moved {
            self.entity_archetype[entity.slot() as usize] = target;
        }
        Ok(())
    }

    // ========== Queries ==========

    /// Cached query over archetypes containing every listed component.
    pub fn query(&mut self, include: &[ComponentId]) -> QueryId {
        let include = Self::mask_of(include);
        self.queries.get_or_insert(include, None, None, &self.archetypes)
    }

    /// Cached query with explicit exclude / any-of filters. Empty slices
    /// mean "no filter".
    pub fn query_filtered(
        &mut self,
        include: &[ComponentId],
        exclude: &[ComponentId],
        any_of: &[ComponentId],
    ) -> QueryId {
        let include = Self::mask_of(include);
        let exclude = (!exclude.is_empty()).then(|| Self::mask_of(exclude));
        let any_of = (!any_of.is_empty()).then(|| Self::mask_of(any_of));
        self.queries.get_or_insert(include, exclude, any_of, &self.archetypes)
    }

    /// Widen a query's include mask. Adding an already-included component
    /// resolves to the same query.
    pub fn query_and(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        let (include, exclude, any_of) = self.cloned_masks(query);
        let mut include = include;
        for &c in components {
            include.set(c.index());
        }
        self.queries.get_or_insert(include, exclude, any_of, &self.archetypes)
    }

    /// Widen a query's exclude mask.
    pub fn query_not(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        let (include, exclude, any_of) = self.cloned_masks(query);
        let mut exclude = exclude.unwrap_or_default();
        for &c in components {
            exclude.set(c.index());
        }
        self.queries.get_or_insert(include, Some(exclude), any_of, &self.archetypes)
    }

    /// Widen a query's any-of mask.
    pub fn query_or(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        let (include, exclude, any_of) = self.cloned_masks(query);
        let mut any_of = any_of.unwrap_or_default();
        for &c in components {
            any_of.set(c.index());
        }
        self.queries.get_or_insert(include, exclude, Some(any_of), &self.archetypes)
    }

    /// Matched archetype ids in creation order (including empty ones).
    pub fn query_archetype_ids(&mut self, query: QueryId) -> Vec<ArchetypeId> {
        self.queries.sync(&self.archetypes);
        self.queries.matches(query).to_vec()
    }

    /// Total entity count across a query's matched archetypes.
    pub fn query_count(&mut self, query: QueryId) -> usize {
        self.queries.sync(&self.archetypes);
        self.queries
            .matches(query)
            .iter()
            .filter_map(|&id| self.archetypes.get(id))
            .map(Archetype::len)
            .sum()
    }

    /// Invoke `f` once per non-empty matched archetype.
    ///
    /// Column references inside the chunk are valid for the duration of the
    /// callback only.
    pub fn for_each_chunk<F>(&mut self, query: QueryId, mut f: F) -> Result<()>
    where
        F: FnMut(&mut ArchetypeChunkMut<'_>) -> Result<()>,
    {
        self.queries.sync(&self.archetypes);
        // Clone the match list so archetype access below cannot alias it
        let matched = self.queries.matches(query).to_vec();
        for id in matched {
            let Some(archetype) = self.archetypes.get_mut(id) else {
                continue;
            };
            if archetype.is_empty() {
                continue;
            }
            let mut chunk = ArchetypeChunkMut::new(archetype);
            f(&mut chunk)?;
        }
        Ok(())
    }

    /// Get query cache statistics for diagnostics
    pub fn query_cache_stats(&self) -> QueryCacheStats {
        self.queries.stats()
    }

    // ========== Archetype access ==========

    /// Get archetype by ID
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Get all archetypes
    pub fn archetypes(&self) -> &[Archetype] {
        self.archetypes.archetypes()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Archetype currently holding a live entity.
    pub fn entity_archetype_id(&self, entity: EntityId) -> Result<ArchetypeId> {
        Ok(self.location(entity)?.0)
    }

    /// Archetypes whose signature contains `component`.
    pub fn component_archetypes(&self, component: ComponentId) -> &[ArchetypeId] {
        self.archetypes.component_archetypes(component)
    }

    /// Read access to the component registry (schemas + staging columns).
    pub fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    // ========== Internals ==========

    /// Archetype id and row of a live entity.
    fn location(&self, entity: EntityId) -> Result<(ArchetypeId, usize)> {
        if !self.is_alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        let slot = entity.slot();
        let archetype_id = self.entity_archetype[slot as usize];
        let row = self
            .archetypes
            .get(archetype_id)
            .and_then(|a| a.row_of(slot))
            .ok_or(EcsError::NotInArchetype)?;
        Ok((archetype_id, row))
    }

    /// Move an entity between archetypes: allocate the target row, copy the
    /// shared columns, then swap-and-pop the source row.
    fn move_entity(&mut self, entity: EntityId, from: ArchetypeId, to: ArchetypeId) -> Result<usize> {
        debug_assert_ne!(from, to);
        let slot = entity.slot();
        let (src, dst) = self.archetypes.pair_mut(from, to);

        let src_row = src.row_of(slot).ok_or(EcsError::NotInArchetype)?;
        let dst_row = dst.add_entity(entity);
        copy_shared_row(src, src_row, dst, dst_row);
        src.remove_entity(slot)?;
        Ok(dst_row)
    }

    fn mask_of(components: &[ComponentId]) -> BitSet {
        let mut mask = BitSet::default();
        for &c in components {
            mask.set(c.index());
        }
        mask
    }

    fn cloned_masks(&self, query: QueryId) -> (BitSet, Option<BitSet>, Option<BitSet>) {
        let (include, exclude, any_of) = self.queries.masks(query);
        (include.clone(), exclude.cloned(), any_of.cloned())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
