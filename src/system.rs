//! System context: the world borrow handed to running systems.
//!
//! Structural mutations issued through the context are deferred onto the
//! world's command buffer and applied at the phase boundary, so traversals
//! started by any system in the phase stay valid. Spawning and field access
//! are immediate: a fresh entity lands in the empty archetype and cannot
//! invalidate an iteration in progress, and field writes never move rows.

use crate::archetype::ArchetypeId;
use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::error::Result;
use crate::query::{ArchetypeChunkMut, QueryId};
use crate::world::World;

/// Per-system view of the world.
pub struct SystemContext<'w> {
    world: &'w mut World,
}

impl<'w> SystemContext<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    // ========== Immediate operations ==========

    /// Spawn an entity with no components. Immediate.
    pub fn spawn_empty(&mut self) -> Result<EntityId> {
        self.world.spawn_empty()
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.world.is_alive(entity)
    }

    pub fn has_component(&self, entity: EntityId, component: ComponentId) -> Result<bool> {
        self.world.has_component(entity, component)
    }

    pub fn entity_count(&self) -> u32 {
        self.world.entity_count()
    }

    /// Read one field of a component on an entity. Immediate.
    pub fn get_field(&self, entity: EntityId, component: ComponentId, field: usize) -> Result<f64> {
        self.world.get_field(entity, component, field)
    }

    /// Write one field of a component on an entity. Immediate.
    pub fn set_field(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        field: usize,
        value: f64,
    ) -> Result<()> {
        self.world.set_field(entity, component, field, value)
    }

    // ========== Deferred operations ==========

    /// Queue a component add for the phase boundary, capturing the values
    /// now.
    pub fn add_component(&mut self, entity: EntityId, component: ComponentId, values: &[f64]) {
        self.world.add_component_deferred(entity, component, values);
    }

    /// Queue a component remove for the phase boundary.
    pub fn remove_component(&mut self, entity: EntityId, component: ComponentId) {
        self.world.remove_component_deferred(entity, component);
    }

    /// Queue a despawn for the phase boundary.
    pub fn despawn(&mut self, entity: EntityId) {
        self.world.despawn_deferred(entity);
    }

    // ========== Queries ==========

    pub fn query(&mut self, include: &[ComponentId]) -> QueryId {
        self.world.query(include)
    }

    pub fn query_filtered(
        &mut self,
        include: &[ComponentId],
        exclude: &[ComponentId],
        any_of: &[ComponentId],
    ) -> QueryId {
        self.world.query_filtered(include, exclude, any_of)
    }

    pub fn query_and(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        self.world.query_and(query, components)
    }

    pub fn query_not(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        self.world.query_not(query, components)
    }

    pub fn query_or(&mut self, query: QueryId, components: &[ComponentId]) -> QueryId {
        self.world.query_or(query, components)
    }

    pub fn query_archetype_ids(&mut self, query: QueryId) -> Vec<ArchetypeId> {
        self.world.query_archetype_ids(query)
    }

    pub fn query_count(&mut self, query: QueryId) -> usize {
        self.world.query_count(query)
    }

    /// Invoke `f` once per non-empty matched archetype.
    pub fn for_each_chunk<F>(&mut self, query: QueryId, f: F) -> Result<()>
    where
        F: FnMut(&mut ArchetypeChunkMut<'_>) -> Result<()>,
    {
        self.world.for_each_chunk(query, f)
    }

    // ========== Manual flush ==========

    /// Apply the deferred buffers now instead of at the phase boundary.
    ///
    /// Permitted, but any cached column reference is invalid afterwards.
    pub fn flush(&mut self) -> Result<()> {
        self.world.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentSchema, FieldType};

    #[test]
    fn test_context_defers_structural_ops() -> Result<()> {
        let mut world = World::new();
        let pos = world.register_component(
            ComponentSchema::new("Position")
                .field("x", FieldType::F64)
                .field("y", FieldType::F64),
        );
        let entity = world.spawn_empty()?;

        {
            let mut ctx = SystemContext::new(&mut world);
            ctx.add_component(entity, pos, &[1.0, 2.0]);
            // Not applied yet
            assert!(!ctx.has_component(entity, pos)?);
        }
        assert_eq!(world.pending_command_count(), 1);

        world.flush()?;
        assert!(world.has_component(entity, pos)?);
        assert_eq!(world.get_field(entity, pos, 1)?, 2.0);
        Ok(())
    }

    #[test]
    fn test_context_spawn_is_immediate() -> Result<()> {
        let mut world = World::new();
        let mut ctx = SystemContext::new(&mut world);
        let entity = ctx.spawn_empty()?;
        assert!(ctx.is_alive(entity));
        assert_eq!(ctx.entity_count(), 1);
        Ok(())
    }

    #[test]
    fn test_context_manual_flush() -> Result<()> {
        let mut world = World::new();
        let tag = world.register_tag("Marked");
        let entity = world.spawn_empty()?;

        let mut ctx = SystemContext::new(&mut world);
        ctx.add_component(entity, tag, &[]);
        ctx.flush()?;
        assert!(ctx.has_component(entity, tag)?);
        Ok(())
    }
}
