//! Entity handles and the entity registry
//!
//! Entities are lightweight generational handles (4 bytes). The registry owns
//! one generation per index plus the list of components linked to each live
//! entity. Destroying an entity bumps its generation, which invalidates every
//! outstanding copy of the handle at once.
//!
//! Freed indices are parked in a FIFO queue and only recycled once the queue
//! holds at least `reuse_threshold` entries. Until then a destroyed index is a
//! zombie: dead, but not yet available to `create`.

use crate::config::DEFAULT_REUSE_THRESHOLD;
use crate::ecs::handle::{check_index, next_generation, Generation, Handle};
use crate::ecs::system::{ComponentTypeId, OwnerSystem};
use std::collections::VecDeque;
use std::fmt;

/// Entity handle (generation-indexed for safety).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Entity(Handle);

impl Entity {
    /// The null entity.
    pub const INVALID: Entity = Entity(Handle::INVALID);

    #[inline]
    pub const fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    #[inline]
    pub const fn handle(self) -> Handle {
        self.0
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0.index()
    }

    #[inline]
    pub const fn generation(self) -> Generation {
        self.0.generation()
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Serialize to a raw integer (scripting/editor boundary).
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0.to_bits()
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(Handle::from_bits(bits))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Components linked to one entity, in attachment order.
///
/// `component_types[i]` and `component_handles[i]` describe the same
/// attachment. A type appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityComponentData {
    component_types: Vec<ComponentTypeId>,
    component_handles: Vec<Handle>,
}

impl EntityComponentData {
    #[inline]
    pub fn len(&self) -> usize {
        self.component_types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.component_types.is_empty()
    }

    pub fn types(&self) -> &[ComponentTypeId] {
        &self.component_types
    }

    pub fn handles(&self) -> &[Handle] {
        &self.component_handles
    }

    /// `(type, handle)` pairs in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeId, Handle)> + '_ {
        self.component_types
            .iter()
            .copied()
            .zip(self.component_handles.iter().copied())
    }

    /// Linear scan; entities carry few components.
    pub fn handle_of(&self, ty: ComponentTypeId) -> Handle {
        self.component_types
            .iter()
            .position(|t| *t == ty)
            .map(|i| self.component_handles[i])
            .unwrap_or(Handle::INVALID)
    }

    fn push(&mut self, ty: ComponentTypeId, handle: Handle) -> bool {
        if self.component_types.contains(&ty) {
            return false;
        }
        self.component_types.push(ty);
        self.component_handles.push(handle);
        true
    }

    fn remove(&mut self, ty: ComponentTypeId, handle: Handle) -> bool {
        let found = self
            .iter()
            .position(|(t, h)| t == ty && h == handle);
        match found {
            Some(i) => {
                self.component_types.remove(i);
                self.component_handles.remove(i);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.component_types.clear();
        self.component_handles.clear();
    }
}

/// Allocates entity identifiers and records their component links.
///
/// The registry itself does not know how to destroy components; the world
/// drives cascading destruction using [`EntityRegistry::release`].
pub struct EntityRegistry {
    generations: Vec<Generation>,
    // Per-index liveness; a freed index stays false until it is handed out.
    live: Vec<bool>,
    components: Vec<EntityComponentData>,
    free: VecDeque<u32>,
    reuse_threshold: usize,
    alive: usize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::with_reuse_threshold(DEFAULT_REUSE_THRESHOLD)
    }

    pub fn with_reuse_threshold(reuse_threshold: usize) -> Self {
        Self {
            generations: Vec::new(),
            live: Vec::new(),
            components: Vec::new(),
            free: VecDeque::new(),
            reuse_threshold,
            alive: 0,
        }
    }

    /// Allocate a new entity.
    ///
    /// Recycles the oldest freed index once at least `reuse_threshold`
    /// indices are queued, otherwise appends a fresh index with generation 0.
    pub fn create(&mut self) -> Entity {
        let index = if self.free.len() >= self.reuse_threshold && !self.free.is_empty() {
            self.free.pop_front().unwrap_or_default()
        } else {
            let index = self.generations.len() as u32;
            check_index(index);
            self.generations.push(0);
            self.live.push(false);
            self.components.push(EntityComponentData::default());
            index
        };
        self.live[index as usize] = true;
        self.alive += 1;
        let entity = Entity(Handle::pack(index, self.generations[index as usize]));
        tracing::trace!(%entity, "entity created");
        entity
    }

    /// Whether `entity` is still alive.
    #[inline]
    pub fn alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let (index, generation) = entity.0.unpack();
        let index = index as usize;
        self.live.get(index).is_some_and(|live| *live) && self.generations[index] == generation
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.alive
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Number of destroyed indices waiting for reuse.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Kill `entity` and hand back its component links so the caller can
    /// destroy the components. Returns `None` if the entity was not alive.
    pub fn release(&mut self, entity: Entity) -> Option<EntityComponentData> {
        if !self.alive(entity) {
            return None;
        }
        let index = entity.index() as usize;
        self.generations[index] = next_generation(self.generations[index]);
        self.live[index] = false;
        self.free.push_back(entity.index());
        self.alive -= 1;
        let data = std::mem::take(&mut self.components[index]);
        tracing::trace!(%entity, components = data.len(), "entity released");
        Some(data)
    }

    /// Record that `handle` of type `ty` belongs to `entity`.
    ///
    /// Returns false (and records nothing) if the entity is dead or already
    /// has a component of that type.
    pub fn link(&mut self, entity: Entity, handle: Handle, ty: ComponentTypeId) -> bool {
        if !self.alive(entity) {
            tracing::warn!(%entity, %ty, "link on dead entity");
            return false;
        }
        let linked = self.components[entity.index() as usize].push(ty, handle);
        if !linked {
            tracing::warn!(%entity, %ty, "entity already has a component of this type");
        }
        linked
    }

    /// Forget the link between `entity` and `handle`. Destroying the component
    /// itself is the caller's job.
    pub fn unlink(&mut self, entity: Entity, handle: Handle, ty: ComponentTypeId) -> bool {
        if !self.alive(entity) {
            tracing::warn!(%entity, %ty, "unlink on dead entity");
            return false;
        }
        self.components[entity.index() as usize].remove(ty, handle)
    }

    /// Handle of the `ty` component on `entity`, or [`Handle::INVALID`].
    pub fn get_handle(&self, entity: Entity, ty: ComponentTypeId) -> Handle {
        match self.component_data(entity) {
            Some(data) => data.handle_of(ty),
            None => Handle::INVALID,
        }
    }

    pub fn component_data(&self, entity: Entity) -> Option<&EntityComponentData> {
        if self.alive(entity) {
            self.components.get(entity.index() as usize)
        } else {
            None
        }
    }

    /// Iterate live entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.generations
            .iter()
            .zip(&self.live)
            .enumerate()
            .filter(|(_, (_, live))| **live)
            .map(|(index, (generation, _))| Entity(Handle::pack(index as u32, *generation)))
    }

    /// Drop every entity. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        for (slot, live) in self.live.iter_mut().enumerate() {
            if !*live {
                continue;
            }
            *live = false;
            self.generations[slot] = next_generation(self.generations[slot]);
            self.components[slot].clear();
            self.free.push_back(slot as u32);
        }
        self.alive = 0;
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry is itself an owner system: it hands out handles that are not
/// attached to anything else.
impl OwnerSystem for EntityRegistry {
    fn create(&mut self) -> Handle {
        EntityRegistry::create(self).handle()
    }

    fn destroy(&mut self, handle: Handle) {
        if self.release(Entity::from_handle(handle)).is_none() {
            tracing::warn!(%handle, "destroy on dead entity");
        }
    }
}
