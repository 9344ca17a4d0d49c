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

//! Error types

use std::fmt;

use crate::component::ComponentId;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity slot space (2^20 concurrent entities) exhausted
    EntityCapacityExhausted { attempted: usize, capacity: usize },

    /// Generation counter for a slot left its 12-bit range
    GenerationOverflow { slot: u32 },

    /// Entity not found (stale or never-allocated ID)
    EntityNotFound,

    /// Immediate despawn of an entity that is not alive
    DoubleDespawn,

    /// Swap-and-pop targeted a slot the archetype does not contain
    NotInArchetype,

    /// Component handle is unregistered, or absent from the entity
    ComponentNotFound,

    /// Archetype not found
    ArchetypeNotFound,

    /// Field index out of range for the component schema
    FieldOutOfBounds { component: ComponentId, field: usize },

    /// System with this name is already registered
    DuplicateSystem(String),

    /// System not found
    SystemNotFound,

    /// System dependency cycle detected
    SystemCycleDetected,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityCapacityExhausted {
                attempted,
                capacity,
            } => {
                write!(
                    f,
                    "Entity capacity exhausted: attempted to allocate {attempted}, max is {capacity}"
                )
            }
            EcsError::GenerationOverflow { slot } => {
                write!(f, "Generation overflow on entity slot {slot}")
            }
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::DoubleDespawn => write!(f, "Entity already despawned"),
            EcsError::NotInArchetype => write!(f, "Entity not present in archetype"),
            EcsError::ComponentNotFound => write!(f, "Component not found"),
            EcsError::ArchetypeNotFound => write!(f, "Archetype not found"),
            EcsError::FieldOutOfBounds { component, field } => {
                write!(
                    f,
                    "Field {field} out of bounds for component {}",
                    component.index()
                )
            }
            EcsError::DuplicateSystem(name) => write!(f, "System already registered: {name}"),
            EcsError::SystemNotFound => write!(f, "System not found"),
            EcsError::SystemCycleDetected => write!(f, "System dependency cycle detected"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
