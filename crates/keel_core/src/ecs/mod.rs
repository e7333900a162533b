//! Entity/component data core.
//!
//! Entities are generational handles with no data of their own. Every
//! component kind is owned by one system holding a structure-of-arrays
//! [`ComponentStore`]; the [`World`] links entities to component handles and
//! drives cascading destruction. Transforms are a built-in system that keeps
//! each subtree contiguous in dense order.

mod access;
mod entity;
mod error;
pub mod handle;
mod row;
mod store;
mod system;
mod transform;
mod world;

pub use access::{validate_stage, AccessError, Schedule, SystemAccess};
pub use entity::{Entity, EntityComponentData, EntityRegistry};
pub use error::WorldError;
pub use handle::{Generation, Handle};
pub use row::{ColumnAt, Row};
pub use store::{ComponentStore, DenseIndex, SparseIndex};
pub use system::{ComponentSystem, ComponentTypeId, DataComponentSystem, OwnerSystem};
pub use transform::{DirtyFlags, TransformSystem};
pub use world::{World, WorldState};
