//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use columnar_ecs::prelude::*;
//! ```

pub use crate::component::{ComponentId, ComponentSchema, FieldType};
pub use crate::entity::EntityId;
pub use crate::error::{EcsError, Result};
pub use crate::query::{ArchetypeChunkMut, QueryId};
pub use crate::schedule::{Phase, Scheduler, SystemDescriptor};
pub use crate::system::SystemContext;
pub use crate::world::World;
