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

//! Columnar ECS - archetype-based Entity Component System core
//!
//! Entities are packed generational IDs, components are runtime-described
//! numeric schemas, and storage is column-oriented per archetype. Systems
//! run in ordered phases with structural changes deferred to phase
//! boundaries.

pub mod archetype;
pub mod bitset;
pub mod command;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod schedule;
pub mod system;
pub mod world;

pub mod prelude;

// Re-exports for convenience
pub use archetype::{Archetype, ArchetypeId, ArchetypeRegistry, EMPTY_ARCHETYPE};
pub use bitset::BitSet;
pub use command::CommandBuffer;
pub use component::{Column, ComponentId, ComponentRegistry, ComponentSchema, FieldType};
pub use entity::{EntityAllocator, EntityId};
pub use error::{EcsError, Result};
pub use query::{ArchetypeChunkMut, QueryCacheStats, QueryEngine, QueryId};
pub use schedule::{Phase, Scheduler, SystemDescriptor, SystemFn};
pub use system::SystemContext;
pub use world::World;
