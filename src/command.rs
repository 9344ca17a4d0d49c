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

//! Deferred mutation buffers.
//!
//! Structural changes issued by running systems land here instead of
//! touching archetypes, so traversals stay valid for the rest of the phase.
//! Adds and removes keep their own queues in insertion order; the flush
//! applies every add before any remove, then processes despawns. Each entry
//! carries the full generational ID so entries that went stale before the
//! flush can be skipped.

use smallvec::SmallVec;

use crate::component::ComponentId;
use crate::entity::EntityId;

/// Deferred component add with its captured field values.
#[derive(Debug, Clone)]
pub struct AddCommand {
    pub entity: EntityId,
    pub component: ComponentId,
    pub values: SmallVec<[f64; 8]>,
}

/// Deferred component remove.
#[derive(Debug, Clone, Copy)]
pub struct RemoveCommand {
    pub entity: EntityId,
    pub component: ComponentId,
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    adds: Vec<AddCommand>,
    removes: Vec<RemoveCommand>,
    despawns: Vec<EntityId>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue add component command
    pub fn add_component(&mut self, entity: EntityId, component: ComponentId, values: &[f64]) {
        self.adds.push(AddCommand {
            entity,
            component,
            values: SmallVec::from_slice(values),
        });
    }

    /// Queue remove component command
    pub fn remove_component(&mut self, entity: EntityId, component: ComponentId) {
        self.removes.push(RemoveCommand { entity, component });
    }

    /// Queue despawn command
    pub fn despawn(&mut self, entity: EntityId) {
        self.despawns.push(entity);
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len() + self.despawns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty() && self.despawns.is_empty()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.adds.clear();
        self.removes.clear();
        self.despawns.clear();
    }

    pub(crate) fn take_adds(&mut self) -> Vec<AddCommand> {
        std::mem::take(&mut self.adds)
    }

    pub(crate) fn take_removes(&mut self) -> Vec<RemoveCommand> {
        std::mem::take(&mut self.removes)
    }

    pub(crate) fn take_despawns(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.despawns)
    }
}
