// system.rs - Owner/component system contracts and runtime type ids
//
// Component kinds are not related at the data level. Each system owns its own
// store and exposes a small capability set; the world reaches the right
// system through a runtime `ComponentTypeId`, so callers such as scripting
// need no compile-time knowledge of concrete component types.

use crate::ecs::error::WorldError;
use crate::ecs::{ComponentStore, Entity, Handle};
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Runtime identifier of a component kind (one per system type).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    /// Id for system type `S`, allocated on first request.
    pub fn of<S: ComponentSystem>() -> Self {
        type_table_id(TypeId::of::<S>(), std::any::type_name::<S>())
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Name of the system type this id was allocated for.
    pub fn name(self) -> Option<&'static str> {
        let table = TYPE_TABLE.read().unwrap_or_else(|e| e.into_inner());
        table.names.get(self.0 as usize).copied()
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct TypeTable {
    ids: HashMap<TypeId, ComponentTypeId>,
    names: Vec<&'static str>,
}

/// Process-wide table of system types. Holds type metadata only; all world
/// state lives in `World`.
static TYPE_TABLE: Lazy<RwLock<TypeTable>> = Lazy::new(|| RwLock::new(TypeTable::default()));

fn type_table_id(type_id: TypeId, name: &'static str) -> ComponentTypeId {
    if let Some(id) = TYPE_TABLE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .ids
        .get(&type_id)
    {
        return *id;
    }
    let mut table = TYPE_TABLE.write().unwrap_or_else(|e| e.into_inner());
    if let Some(id) = table.ids.get(&type_id) {
        return *id;
    }
    let id = ComponentTypeId(table.names.len() as u32);
    table.names.push(name);
    table.ids.insert(type_id, id);
    tracing::debug!(%id, name, "component type id allocated");
    id
}

/// Manager of objects that are not necessarily attached to entities.
pub trait OwnerSystem {
    fn create(&mut self) -> Handle;

    fn destroy(&mut self, handle: Handle);
}

/// Manager of one component kind attached to entities.
///
/// Implementations own their storage outright; the world only ever holds the
/// opaque handles they return.
pub trait ComponentSystem: Any + Send + Sync {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Allocate a component for `entity` and return its handle.
    fn create(&mut self, entity: Entity) -> Handle;

    /// Release the component behind `handle`.
    fn destroy(&mut self, handle: Handle);

    fn is_valid(&self, handle: Handle) -> bool;

    /// Number of live components.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Called once when the owning world starts.
    fn on_initialize(&mut self) {}

    /// Called once when the owning world stops.
    fn on_terminate(&mut self) {}

    /// Entities that must be destroyed before the owner of `handle` is.
    ///
    /// The transform system reports the owners of direct children here so
    /// that destroying an entity takes its whole subtree with it.
    fn dependents(&self, _handle: Handle, _out: &mut Vec<Entity>) {}

    /// Copy the component out as a self-contained value.
    fn copy_out(&self, _handle: Handle) -> Option<Box<dyn Any + Send>> {
        None
    }

    /// Overwrite the component from a value produced by `copy_out`.
    fn copy_in(&mut self, _handle: Handle, _value: &dyn Any) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct RegisteredSystem {
    ty: ComponentTypeId,
    system: Box<dyn ComponentSystem>,
}

/// Per-world table of component systems, kept in registration order.
pub(crate) struct SystemRegistry {
    systems: Vec<RegisteredSystem>,
    by_type: HashMap<ComponentTypeId, usize>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    pub fn register<S: ComponentSystem>(
        &mut self,
        system: S,
    ) -> Result<ComponentTypeId, WorldError> {
        let ty = ComponentTypeId::of::<S>();
        if self.by_type.contains_key(&ty) {
            return Err(WorldError::DuplicateSystem {
                name: system.name(),
                ty,
            });
        }
        tracing::debug!(%ty, name = system.name(), "component system registered");
        self.by_type.insert(ty, self.systems.len());
        self.systems.push(RegisteredSystem {
            ty,
            system: Box::new(system),
        });
        Ok(ty)
    }

    pub fn contains(&self, ty: ComponentTypeId) -> bool {
        self.by_type.contains_key(&ty)
    }

    pub fn get(&self, ty: ComponentTypeId) -> Option<&dyn ComponentSystem> {
        self.by_type
            .get(&ty)
            .and_then(|&idx| self.systems.get(idx))
            .map(|entry| &*entry.system)
    }

    pub fn get_mut(&mut self, ty: ComponentTypeId) -> Option<&mut (dyn ComponentSystem + 'static)> {
        let idx = *self.by_type.get(&ty)?;
        self.systems.get_mut(idx).map(|entry| &mut *entry.system)
    }

    /// Registered type ids in registration order.
    pub fn types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.systems.iter().map(|entry| entry.ty)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn ComponentSystem + 'static)> {
        self.systems.iter_mut().map(|entry| &mut *entry.system)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }
}

/// Ready-made system for plain data components.
///
/// Rows are `(owner, value)`; removal is swap-removal, so iteration order
/// changes as components come and go.
pub struct DataComponentSystem<T: Send + Sync + 'static> {
    store: ComponentStore<(Entity, T)>,
}

impl<T> DataComponentSystem<T>
where
    T: Default + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            store: ComponentStore::new(),
        }
    }

    pub fn with_capacity(capacity: usize, reuse_threshold: usize) -> Self {
        Self {
            store: ComponentStore::with_capacity(capacity, reuse_threshold),
        }
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.store.is_valid(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.store.try_get::<1>(handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.store.try_get_mut::<1>(handle)
    }

    pub fn owner(&self, handle: Handle) -> Option<Entity> {
        self.store.try_get::<0>(handle).copied()
    }

    /// Dense iteration over `(owner, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.store
            .column::<0>()
            .iter()
            .copied()
            .zip(self.store.column::<1>().iter())
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        self.store.column_mut::<1>()
    }

    pub fn store(&self) -> &ComponentStore<(Entity, T)> {
        &self.store
    }
}

impl<T> Default for DataComponentSystem<T>
where
    T: Default + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentSystem for DataComponentSystem<T>
where
    T: Default + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn create(&mut self, entity: Entity) -> Handle {
        self.store.add((entity, T::default()))
    }

    fn destroy(&mut self, handle: Handle) {
        self.store.remove(handle);
    }

    fn is_valid(&self, handle: Handle) -> bool {
        self.store.is_valid(handle)
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn copy_out(&self, handle: Handle) -> Option<Box<dyn Any + Send>> {
        self.get(handle)
            .map(|value| Box::new(value.clone()) as Box<dyn Any + Send>)
    }

    fn copy_in(&mut self, handle: Handle, value: &dyn Any) -> bool {
        match (value.downcast_ref::<T>(), self.get_mut(handle)) {
            (Some(value), Some(slot)) => {
                *slot = value.clone();
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Health(i32);

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Armor(i32);

    #[test]
    fn type_ids_are_stable_per_type() {
        let a = ComponentTypeId::of::<DataComponentSystem<Health>>();
        let b = ComponentTypeId::of::<DataComponentSystem<Health>>();
        let c = ComponentTypeId::of::<DataComponentSystem<Armor>>();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.name().unwrap().contains("Health"));
    }

    #[test]
    fn registry_dispatches_by_type_id() {
        let mut registry = SystemRegistry::new();
        let health = registry
            .register(DataComponentSystem::<Health>::new())
            .unwrap();
        let armor = registry
            .register(DataComponentSystem::<Armor>::new())
            .unwrap();
        assert_eq!(registry.types().collect::<Vec<_>>(), vec![health, armor]);

        let entity = Entity::from_handle(Handle::pack(0, 0));
        let handle = registry.get_mut(health).unwrap().create(entity);
        assert!(registry.get(health).unwrap().is_valid(handle));
        assert_eq!(registry.get(armor).unwrap().len(), 0);

        let typed = registry
            .get(health)
            .and_then(|system| system.as_any().downcast_ref::<DataComponentSystem<Health>>())
            .unwrap();
        assert_eq!(typed.owner(handle), Some(entity));

        registry.get_mut(health).unwrap().destroy(handle);
        assert!(!registry.get(health).unwrap().is_valid(handle));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = SystemRegistry::new();
        registry
            .register(DataComponentSystem::<Health>::new())
            .unwrap();
        let err = registry
            .register(DataComponentSystem::<Health>::new())
            .unwrap_err();
        assert!(matches!(err, WorldError::DuplicateSystem { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn typed_queries_need_no_trait_in_scope() {
        fn fill(system: &mut DataComponentSystem<Armor>, n: u32) -> Vec<Handle> {
            (0..n)
                .map(|i| ComponentSystem::create(system, Entity::from_handle(Handle::pack(i, 0))))
                .collect()
        }

        let mut system = DataComponentSystem::<Armor>::new();
        assert!(DataComponentSystem::is_empty(&system));
        let handles = fill(&mut system, 3);
        ComponentSystem::destroy(&mut system, handles[1]);
        assert_eq!(DataComponentSystem::len(&system), 2);
        assert!(DataComponentSystem::is_valid(&system, handles[0]));
        assert!(!DataComponentSystem::is_valid(&system, handles[1]));
    }

    #[test]
    fn copy_round_trip() {
        let mut system = DataComponentSystem::<Health>::new();
        let entity = Entity::from_handle(Handle::pack(3, 0));
        let handle = ComponentSystem::create(&mut system, entity);
        *system.get_mut(handle).unwrap() = Health(42);

        let value = system.copy_out(handle).unwrap();
        let other = ComponentSystem::create(&mut system, entity);
        assert!(system.copy_in(other, &*value));
        assert_eq!(system.get(other), Some(&Health(42)));

        assert!(!system.copy_in(other, &Armor(1)));
        ComponentSystem::destroy(&mut system, handle);
        assert!(system.copy_out(handle).is_none());
    }
}
