// world.rs - Entity lifecycle, component linking and cascading destroy
//
// A world owns one entity registry and one instance of every component
// system. Nothing here is global: callers that need the world get it passed
// in. The transform system is built in and always comes first in
// registration order.

use crate::config::CoreConfig;
use crate::ecs::error::WorldError;
use crate::ecs::system::SystemRegistry;
use crate::ecs::{
    ComponentSystem, ComponentTypeId, DataComponentSystem, Entity, EntityRegistry, Handle,
    TransformSystem,
};
use std::any::Any;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorldState {
    /// Systems may still be registered.
    Created,
    Running,
    Terminated,
}

/// Container for entities and the component systems attached to them.
pub struct World {
    config: CoreConfig,
    state: WorldState,
    entities: EntityRegistry,
    transforms: TransformSystem,
    transform_type: ComponentTypeId,
    systems: SystemRegistry,
}

impl World {
    pub fn new(config: CoreConfig) -> Self {
        let transforms = TransformSystem::with_capacity(
            config.initial_capacity,
            config.component_reuse_threshold,
        );
        Self {
            entities: EntityRegistry::with_reuse_threshold(config.entity_reuse_threshold),
            transforms,
            transform_type: ComponentTypeId::of::<TransformSystem>(),
            systems: SystemRegistry::new(),
            state: WorldState::Created,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register a component system. Only allowed before `initialize`.
    pub fn register_system<S: ComponentSystem>(
        &mut self,
        system: S,
    ) -> Result<ComponentTypeId, WorldError> {
        match self.state {
            WorldState::Created => {}
            WorldState::Running => return Err(WorldError::AlreadyInitialized),
            WorldState::Terminated => return Err(WorldError::Terminated),
        }
        let ty = ComponentTypeId::of::<S>();
        if ty == self.transform_type {
            return Err(WorldError::DuplicateSystem {
                name: system.name(),
                ty,
            });
        }
        self.systems.register(system)
    }

    /// Register a [`DataComponentSystem`] for `T`, sized from the world config.
    pub fn register_data<T>(&mut self) -> Result<ComponentTypeId, WorldError>
    where
        T: Default + Clone + Send + Sync + 'static,
    {
        self.register_system(DataComponentSystem::<T>::with_capacity(
            self.config.initial_capacity,
            self.config.component_reuse_threshold,
        ))
    }

    /// Run every system's `on_initialize` in registration order.
    pub fn initialize(&mut self) -> Result<(), WorldError> {
        match self.state {
            WorldState::Created => {}
            WorldState::Running => return Err(WorldError::AlreadyInitialized),
            WorldState::Terminated => return Err(WorldError::Terminated),
        }
        self.transforms.on_initialize();
        for system in self.systems.iter_mut() {
            system.on_initialize();
        }
        self.state = WorldState::Running;
        tracing::info!(systems = self.system_count(), "world initialized");
        Ok(())
    }

    /// Destroy every remaining entity, then run every system's
    /// `on_terminate` in registration order.
    pub fn terminate(&mut self) -> Result<(), WorldError> {
        match self.state {
            WorldState::Running => {}
            WorldState::Created => return Err(WorldError::NotInitialized),
            WorldState::Terminated => return Err(WorldError::Terminated),
        }
        // Everything goes, so no cascade: release each entity and drop the
        // transform rows in one sweep.
        let remaining: Vec<Entity> = self.entities.iter().collect();
        let mut ignored = Vec::new();
        for entity in remaining {
            self.release_entity(entity, &mut ignored);
        }
        self.transforms.clear();
        self.transforms.on_terminate();
        for system in self.systems.iter_mut() {
            system.on_terminate();
        }
        self.state = WorldState::Terminated;
        tracing::info!("world terminated");
        Ok(())
    }

    /// Number of registered systems, including transforms.
    pub fn system_count(&self) -> usize {
        self.systems.len() + 1
    }

    /// Registered component types in registration order.
    pub fn component_types(&self) -> Vec<ComponentTypeId> {
        std::iter::once(self.transform_type)
            .chain(self.systems.types())
            .collect()
    }

    pub fn has_system(&self, ty: ComponentTypeId) -> bool {
        ty == self.transform_type || self.systems.contains(ty)
    }

    /// Diagnostic name of the system registered for `ty`.
    pub fn system_name(&self, ty: ComponentTypeId) -> Result<&'static str, WorldError> {
        self.system_by_id(ty)
            .map(|system| system.name())
            .ok_or(WorldError::UnknownSystem { ty })
    }

    // ------------------------------------------------------------------
    // System access
    // ------------------------------------------------------------------

    pub fn system_by_id(&self, ty: ComponentTypeId) -> Option<&dyn ComponentSystem> {
        if ty == self.transform_type {
            Some(&self.transforms)
        } else {
            self.systems.get(ty)
        }
    }

    pub fn system_by_id_mut(
        &mut self,
        ty: ComponentTypeId,
    ) -> Option<&mut (dyn ComponentSystem + 'static)> {
        if ty == self.transform_type {
            Some(&mut self.transforms)
        } else {
            self.systems.get_mut(ty)
        }
    }

    pub fn system<S: ComponentSystem>(&self) -> Option<&S> {
        self.system_by_id(ComponentTypeId::of::<S>())?
            .as_any()
            .downcast_ref::<S>()
    }

    pub fn system_mut<S: ComponentSystem>(&mut self) -> Option<&mut S> {
        self.system_by_id_mut(ComponentTypeId::of::<S>())?
            .as_any_mut()
            .downcast_mut::<S>()
    }

    #[inline]
    pub fn transforms(&self) -> &TransformSystem {
        &self.transforms
    }

    #[inline]
    pub fn transforms_mut(&mut self) -> &mut TransformSystem {
        &mut self.transforms
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn create_entity(&mut self) -> Entity {
        self.entities.create()
    }

    /// Create an entity with a root transform attached.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.create();
        self.add_component_by_id(entity, self.transform_type);
        entity
    }

    #[inline]
    pub fn alive(&self, entity: Entity) -> bool {
        self.entities.alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Destroy `entity`, everything that depends on it (its transform
    /// descendants) and all of their components.
    ///
    /// A transform subtree is one contiguous block of rows, so it is removed
    /// in a single pass no matter how many descendants it has.
    ///
    /// Returns the number of entities destroyed.
    pub fn destroy_entity(&mut self, entity: Entity) -> usize {
        if !self.entities.alive(entity) {
            tracing::warn!(%entity, "destroy on dead entity");
            return 0;
        }

        let mut destroyed = 0;
        let mut roots = vec![entity];
        let mut victims = Vec::new();
        while let Some(root) = roots.pop() {
            if !self.entities.alive(root) {
                continue;
            }
            victims.clear();
            let node = self.entities.get_handle(root, self.transform_type);
            let owners = self.transforms.subtree_owners(node);
            if owners.is_empty() {
                victims.push(root);
            } else {
                victims.extend_from_slice(owners);
                self.transforms.destroy_subtree(node);
            }
            for victim in &victims {
                destroyed += self.release_entity(*victim, &mut roots) as usize;
            }
        }
        tracing::trace!(%entity, destroyed, "entity destroyed");
        destroyed
    }

    /// Kill `entity` and destroy its components, except its transform which
    /// the caller removes. Entities other systems report as dependents are
    /// pushed to `dependents`.
    fn release_entity(&mut self, entity: Entity, dependents: &mut Vec<Entity>) -> bool {
        let Some(data) = self.entities.release(entity) else {
            return false;
        };
        for (ty, handle) in data.iter() {
            if ty == self.transform_type {
                continue;
            }
            match self.systems.get_mut(ty) {
                Some(system) => {
                    system.dependents(handle, dependents);
                    system.destroy(handle);
                }
                None => tracing::warn!(%entity, %ty, "component of unregistered type"),
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Attach a component of system `S` to `entity`.
    pub fn add_component<S: ComponentSystem>(&mut self, entity: Entity) -> Handle {
        self.add_component_by_id(entity, ComponentTypeId::of::<S>())
    }

    /// Attach a component of type `ty`. If the entity already has one, that
    /// handle is returned unchanged. Returns [`Handle::INVALID`] for dead
    /// entities and unregistered types.
    pub fn add_component_by_id(&mut self, entity: Entity, ty: ComponentTypeId) -> Handle {
        if !self.entities.alive(entity) {
            tracing::warn!(%entity, %ty, "add_component on dead entity");
            return Handle::INVALID;
        }
        let existing = self.entities.get_handle(entity, ty);
        if !existing.is_null() {
            tracing::warn!(%entity, %ty, "entity already has this component");
            return existing;
        }
        let Some(system) = self.system_by_id_mut(ty) else {
            tracing::warn!(%entity, %ty, "add_component of unregistered type");
            return Handle::INVALID;
        };
        let handle = system.create(entity);
        self.entities.link(entity, handle, ty);
        handle
    }

    pub fn remove_component<S: ComponentSystem>(&mut self, entity: Entity) -> bool {
        self.remove_component_by_id(entity, ComponentTypeId::of::<S>())
    }

    /// Unlink and destroy the `ty` component of `entity`. Removing a transform
    /// detaches its children to the root.
    pub fn remove_component_by_id(&mut self, entity: Entity, ty: ComponentTypeId) -> bool {
        let handle = self.entities.get_handle(entity, ty);
        if handle.is_null() {
            return false;
        }
        self.entities.unlink(entity, handle, ty);
        if let Some(system) = self.system_by_id_mut(ty) {
            system.destroy(handle);
        }
        true
    }

    pub fn get_handle<S: ComponentSystem>(&self, entity: Entity) -> Handle {
        self.entities.get_handle(entity, ComponentTypeId::of::<S>())
    }

    pub fn get_handle_by_id(&self, entity: Entity, ty: ComponentTypeId) -> Handle {
        self.entities.get_handle(entity, ty)
    }

    pub fn has_component<S: ComponentSystem>(&self, entity: Entity) -> bool {
        !self.get_handle::<S>(entity).is_null()
    }

    /// Copy a component out as a self-contained value (scripting boundary).
    pub fn copy_component(
        &self,
        entity: Entity,
        ty: ComponentTypeId,
    ) -> Option<Box<dyn Any + Send>> {
        let handle = self.entities.get_handle(entity, ty);
        if handle.is_null() {
            return None;
        }
        self.system_by_id(ty)?.copy_out(handle)
    }

    /// Overwrite a component from a value of the system's copy type.
    pub fn write_component(
        &mut self,
        entity: Entity,
        ty: ComponentTypeId,
        value: &dyn Any,
    ) -> bool {
        let handle = self.entities.get_handle(entity, ty);
        if handle.is_null() {
            return false;
        }
        match self.system_by_id_mut(ty) {
            Some(system) => system.copy_in(handle, value),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Hierarchy by entity
    // ------------------------------------------------------------------

    /// Transform handle of `entity`, or [`Handle::INVALID`].
    pub fn transform_of(&self, entity: Entity) -> Handle {
        self.entities.get_handle(entity, self.transform_type)
    }

    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> bool {
        let node = self.transform_of(child);
        let target = self.transform_of(parent);
        if node.is_null() || target.is_null() {
            tracing::warn!(%child, %parent, "set_parent needs two entities with transforms");
            return false;
        }
        self.transforms.set_parent(node, target)
    }

    pub fn unset_parent(&mut self, entity: Entity) -> bool {
        let node = self.transform_of(entity);
        if node.is_null() {
            tracing::warn!(%entity, "unset_parent on entity without transform");
            return false;
        }
        self.transforms.unset_parent(node)
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        let parent = self.transforms.parent(self.transform_of(entity))?;
        self.transforms.owner(parent)
    }

    pub fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.transforms
            .children(self.transform_of(entity))
            .into_iter()
            .filter_map(|child| self.transforms.owner(child))
            .collect()
    }

    /// Frame boundary: clear per-frame change flags.
    pub fn end_frame(&mut self) {
        self.transforms.end_frame();
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentStore;
    use crate::math::Vec3;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Health(i32);

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Tag(&'static str);

    /// Records lifecycle hooks into a shared log.
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        inner: DataComponentSystem<u8>,
    }

    impl Recorder {
        fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                log: Arc::clone(log),
                inner: DataComponentSystem::new(),
            }
        }

        fn record(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{}:{event}", self.label));
        }
    }

    impl ComponentSystem for Recorder {
        fn create(&mut self, entity: Entity) -> Handle {
            self.record("create");
            self.inner.create(entity)
        }

        fn destroy(&mut self, handle: Handle) {
            self.record("destroy");
            self.inner.destroy(handle)
        }

        fn is_valid(&self, handle: Handle) -> bool {
            self.inner.is_valid(handle)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn on_initialize(&mut self) {
            self.record("init");
        }

        fn on_terminate(&mut self) {
            self.record("term");
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct OtherRecorder(Recorder);

    impl ComponentSystem for OtherRecorder {
        fn create(&mut self, entity: Entity) -> Handle {
            self.0.create(entity)
        }

        fn destroy(&mut self, handle: Handle) {
            self.0.destroy(handle)
        }

        fn is_valid(&self, handle: Handle) -> bool {
            self.0.is_valid(handle)
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn on_initialize(&mut self) {
            self.0.on_initialize()
        }

        fn on_terminate(&mut self) {
            self.0.on_terminate()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn lifecycle_runs_hooks_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::default();
        world.register_system(Recorder::new("a", &log)).unwrap();
        world
            .register_system(OtherRecorder(Recorder::new("b", &log)))
            .unwrap();

        world.initialize().unwrap();
        assert_eq!(world.initialize(), Err(WorldError::AlreadyInitialized));
        assert!(matches!(
            world.register_system(DataComponentSystem::<Health>::new()),
            Err(WorldError::AlreadyInitialized)
        ));

        world.terminate().unwrap();
        assert_eq!(world.terminate(), Err(WorldError::Terminated));
        assert_eq!(*log.lock().unwrap(), vec!["a:init", "b:init", "a:term", "b:term"]);
    }

    #[test]
    fn terminate_requires_initialize() {
        let mut world = World::default();
        assert_eq!(world.terminate(), Err(WorldError::NotInitialized));
        assert_eq!(world.state(), WorldState::Created);
    }

    #[test]
    fn transform_system_is_built_in() {
        let mut world = World::default();
        assert!(world.system::<TransformSystem>().is_some());
        assert_eq!(world.component_types()[0], ComponentTypeId::of::<TransformSystem>());
        assert!(matches!(
            world.register_system(TransformSystem::new()),
            Err(WorldError::DuplicateSystem { .. })
        ));

        assert_eq!(
            world.system_name(ComponentTypeId::of::<TransformSystem>()),
            Ok("Transform")
        );
        let missing = ComponentTypeId::of::<DataComponentSystem<Tag>>();
        assert!(!world.has_system(missing));
        assert_eq!(
            world.system_name(missing),
            Err(WorldError::UnknownSystem { ty: missing })
        );

        let entity = world.spawn();
        assert!(world.has_component::<TransformSystem>(entity));
        assert_eq!(world.transforms().len(), 1);
    }

    #[test]
    fn add_and_remove_components() {
        let mut world = World::default();
        world.register_data::<Health>().unwrap();
        let entity = world.create_entity();

        let handle = world.add_component::<DataComponentSystem<Health>>(entity);
        assert!(!handle.is_null());
        assert_eq!(world.add_component::<DataComponentSystem<Health>>(entity), handle);
        assert_eq!(world.get_handle::<DataComponentSystem<Health>>(entity), handle);

        *world
            .system_mut::<DataComponentSystem<Health>>()
            .unwrap()
            .get_mut(handle)
            .unwrap() = Health(7);

        assert!(world.remove_component::<DataComponentSystem<Health>>(entity));
        assert!(!world.has_component::<DataComponentSystem<Health>>(entity));
        assert!(!world.remove_component::<DataComponentSystem<Health>>(entity));
        assert_eq!(world.system::<DataComponentSystem<Health>>().unwrap().len(), 0);
    }

    #[test]
    fn unregistered_and_dead_entities_are_rejected() {
        let mut world = World::default();
        let entity = world.create_entity();
        assert!(world.add_component::<DataComponentSystem<Tag>>(entity).is_null());

        world.register_data::<Tag>().unwrap();
        world.destroy_entity(entity);
        assert!(world.add_component::<DataComponentSystem<Tag>>(entity).is_null());
        assert_eq!(world.destroy_entity(entity), 0);
    }

    #[test]
    fn destroy_releases_every_component() {
        let mut world = World::default();
        world.register_data::<Health>().unwrap();
        world.register_data::<Tag>().unwrap();
        let entity = world.spawn();
        let health = world.add_component::<DataComponentSystem<Health>>(entity);
        world.add_component::<DataComponentSystem<Tag>>(entity);

        assert_eq!(world.destroy_entity(entity), 1);
        assert!(!world.alive(entity));
        let system = world.system::<DataComponentSystem<Health>>().unwrap();
        assert!(!system.is_valid(health));
        assert_eq!(world.system::<DataComponentSystem<Tag>>().unwrap().len(), 0);
        assert!(world.transforms().is_empty());
    }

    #[test]
    fn destroy_cascades_through_hierarchy() {
        let mut world = World::default();
        world.register_data::<Health>().unwrap();
        let root = world.spawn();
        let child = world.spawn();
        let grandchild = world.spawn();
        let bystander = world.spawn();
        world.add_component::<DataComponentSystem<Health>>(grandchild);

        assert!(world.set_parent(child, root));
        assert!(world.set_parent(grandchild, child));
        assert_eq!(world.parent_of(grandchild), Some(child));
        assert_eq!(world.children_of(root), vec![child]);

        assert_eq!(world.destroy_entity(root), 3);
        assert!(!world.alive(child));
        assert!(!world.alive(grandchild));
        assert!(world.alive(bystander));
        assert_eq!(world.transforms().len(), 1);
        assert_eq!(world.system::<DataComponentSystem<Health>>().unwrap().len(), 0);
        assert!(world.transforms().validate_layout());
    }

    #[test]
    fn removing_transform_detaches_children() {
        let mut world = World::default();
        let parent = world.spawn();
        let child = world.spawn();
        world.set_parent(child, parent);
        let parent_node = world.transform_of(parent);
        world.transforms_mut().set_local_position(parent_node, Vec3::X);

        assert!(world.remove_component::<TransformSystem>(parent));
        assert!(world.alive(parent));
        assert_eq!(world.parent_of(child), None);
        let node = world.transform_of(child);
        let position = world.transforms_mut().world_position(node).unwrap();
        assert!(position.abs_diff_eq(Vec3::X, 1.0e-5));
    }

    #[test]
    fn copy_and_write_by_type_id() {
        let mut world = World::default();
        let ty = world.register_data::<Health>().unwrap();
        let a = world.create_entity();
        let b = world.create_entity();
        let handle = world.add_component_by_id(a, ty);
        world.add_component_by_id(b, ty);
        *world
            .system_mut::<DataComponentSystem<Health>>()
            .unwrap()
            .get_mut(handle)
            .unwrap() = Health(99);

        let value = world.copy_component(a, ty).unwrap();
        assert!(world.write_component(b, ty, &*value));
        let copied = world.get_handle_by_id(b, ty);
        assert_eq!(
            world.system::<DataComponentSystem<Health>>().unwrap().get(copied),
            Some(&Health(99))
        );
        let bare = world.create_entity();
        assert!(world.copy_component(bare, ty).is_none());
    }

    #[test]
    fn cascade_invalidates_every_row_it_removes() {
        let mut world = World::default();
        world.register_data::<Health>().unwrap();
        let root = world.spawn();
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        let sibling = world.spawn();
        world.set_parent(a, root);
        world.set_parent(b, a);
        world.set_parent(c, a);
        world.set_parent(sibling, root);
        for entity in [a, b, c, sibling] {
            world.add_component::<DataComponentSystem<Health>>(entity);
        }
        let nodes = [a, b, c].map(|entity| world.transform_of(entity));
        let healths =
            [a, b, c].map(|entity| world.get_handle::<DataComponentSystem<Health>>(entity));

        assert_eq!(world.destroy_entity(a), 3);
        for node in nodes {
            assert!(!world.transforms().is_valid(node));
        }
        assert_eq!(world.children_of(root), vec![sibling]);
        assert_eq!(world.transforms().descendant_count(world.transform_of(root)), 1);
        assert!(world.transforms().validate_layout());

        let health = world.system::<DataComponentSystem<Health>>().unwrap();
        assert_eq!(health.len(), 1);
        assert!(health.store().check_consistency());
        for handle in healths {
            assert!(!health.is_valid(handle));
        }
        assert_eq!(health.iter().map(|(owner, _)| owner).collect::<Vec<_>>(), vec![sibling]);
    }

    /// Each component drags one other entity down with its owner.
    #[derive(Default)]
    struct Leash {
        store: ComponentStore<(Entity, Entity)>,
    }

    impl ComponentSystem for Leash {
        fn create(&mut self, entity: Entity) -> Handle {
            self.store.add((entity, Entity::INVALID))
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

        fn dependents(&self, handle: Handle, out: &mut Vec<Entity>) {
            if let Some(target) = self.store.try_get::<1>(handle) {
                if !target.is_null() {
                    out.push(*target);
                }
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn cascade_follows_dependents_of_other_systems() {
        let mut world = World::default();
        world.register_system(Leash::default()).unwrap();
        let walker = world.spawn();
        let dog = world.spawn();
        let pup = world.spawn();
        let stray = world.spawn();
        world.set_parent(pup, dog);

        let leash = world.add_component::<Leash>(walker);
        if let Some(system) = world.system_mut::<Leash>() {
            *system.store.get_mut::<1>(leash) = dog;
        }

        assert_eq!(world.destroy_entity(walker), 3);
        for entity in [walker, dog, pup] {
            assert!(!world.alive(entity));
        }
        assert!(world.alive(stray));
        assert_eq!(world.transforms().len(), 1);
        assert_eq!(world.system::<Leash>().unwrap().len(), 0);
        assert!(world.transforms().validate_layout());
    }

    #[test]
    fn terminate_destroys_remaining_entities() {
        let mut world = World::default();
        world.initialize().unwrap();
        let parent = world.spawn();
        let child = world.spawn();
        world.set_parent(child, parent);
        world.terminate().unwrap();
        assert_eq!(world.entity_count(), 0);
        assert!(world.transforms().is_empty());
    }

    #[test]
    fn end_frame_clears_change_flags() {
        let mut world = World::default();
        let entity = world.spawn();
        let node = world.transform_of(entity);
        assert!(!world.transforms().flags(node).is_empty());
        world.end_frame();
        assert!(world.transforms().flags(node).is_empty());
    }
}
