// transform.rs - Transform hierarchy with contiguous subtrees
//
// Every transform is one row of a component store. The dense order of that
// store is a depth-first pre-order walk of the forest: a node at dense index
// `i` with `child_count = c` owns exactly the rows `[i + 1, i + 1 + c)`.
// `child_count` counts all descendants, not only direct children.
//
// Reparenting moves a node's whole row block to the end of its new parent's
// block with one rotation, so the layout holds after any sequence of edits
// and all tree queries are answered from the layout alone.
//
// World matrices are cached per row and rebuilt lazily. Editing a node marks
// its whole block stale; a read walks up only as far as the highest stale
// ancestor and recomputes back down that path.

use crate::config::DEFAULT_REUSE_THRESHOLD;
use crate::ecs::{ComponentStore, ComponentSystem, DenseIndex, Entity, Handle};
use crate::math::{compose, decompose, Mat4, Quat, Vec3};
use rayon::prelude::*;
use std::any::Any;
use std::ops::Range;

/// Per-node change flags.
///
/// `LOCAL` and `PARENT` report what changed since the last `end_frame`; they
/// are for consumers such as rendering or physics. World-cache staleness is
/// tracked separately and survives `end_frame`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirtyFlags(u8);

impl DirtyFlags {
    pub const NONE: DirtyFlags = DirtyFlags(0);
    /// The local transform was edited.
    pub const LOCAL: DirtyFlags = DirtyFlags(1 << 0);
    /// The node was reparented.
    pub const PARENT: DirtyFlags = DirtyFlags(1 << 1);

    const STALE: u8 = 1 << 7;
    const FRAME_MASK: u8 = Self::LOCAL.0 | Self::PARENT.0;

    #[inline]
    pub const fn contains(self, other: DirtyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Change flags only, without cache state.
    #[inline]
    pub const fn changes(self) -> DirtyFlags {
        DirtyFlags(self.0 & Self::FRAME_MASK)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 & Self::FRAME_MASK == 0
    }

    #[inline]
    fn insert(&mut self, other: DirtyFlags) {
        self.0 |= other.0;
    }

    #[inline]
    fn is_stale(self) -> bool {
        self.0 & Self::STALE != 0
    }

    #[inline]
    fn mark_stale(&mut self) {
        self.0 |= Self::STALE;
    }

    #[inline]
    fn clear_stale(&mut self) {
        self.0 &= !Self::STALE;
    }

    #[inline]
    fn clear_changes(&mut self) {
        self.0 &= !Self::FRAME_MASK;
    }
}

impl std::ops::BitOr for DirtyFlags {
    type Output = DirtyFlags;

    fn bitor(self, rhs: DirtyFlags) -> DirtyFlags {
        DirtyFlags(self.0 | rhs.0)
    }
}

/// Columns: owner, parent, child_count, flags, local, world, world inverse.
type TransformRow = (Entity, Handle, u32, DirtyFlags, Mat4, Mat4, Mat4);

const OWNER: usize = 0;
const PARENT: usize = 1;
const CHILD_COUNT: usize = 2;
const FLAGS: usize = 3;
const LOCAL: usize = 4;
const WORLD: usize = 5;
const WORLD_INVERSE: usize = 6;

/// Below this many rows `end_frame` clears flags on the calling thread.
const PARALLEL_CLEAR_THRESHOLD: usize = 16 * 1024;

/// Component system owning every transform of a world.
pub struct TransformSystem {
    store: ComponentStore<TransformRow>,
}

impl TransformSystem {
    pub fn new() -> Self {
        Self::with_capacity(0, DEFAULT_REUSE_THRESHOLD)
    }

    pub fn with_capacity(capacity: usize, reuse_threshold: usize) -> Self {
        Self {
            store: ComponentStore::with_capacity(capacity, reuse_threshold),
        }
    }

    /// Number of transforms.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[inline]
    pub fn is_valid(&self, node: Handle) -> bool {
        self.store.is_valid(node)
    }

    /// Add a root transform for `entity` at the end of the dense order.
    ///
    /// The node starts at identity with both change flags set, so its world
    /// matrix is built on first read.
    pub fn create(&mut self, entity: Entity) -> Handle {
        let mut flags = DirtyFlags::LOCAL | DirtyFlags::PARENT;
        flags.mark_stale();
        self.store.add((
            entity,
            Handle::INVALID,
            0,
            flags,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
        ))
    }

    /// Remove `node`.
    ///
    /// Direct children are detached to the root first and keep their world
    /// pose. [`destroy_subtree`](Self::destroy_subtree) drops them instead.
    pub fn destroy(&mut self, node: Handle) {
        if !self.store.is_valid(node) {
            tracing::warn!(%node, "destroy on stale transform");
            return;
        }
        for child in self.children(node) {
            self.unset_parent(child);
        }
        let parent = *self.store.get::<PARENT>(node);
        self.adjust_ancestors(parent, 1, false);
        self.store.remove_ordered(node);
    }

    /// Remove every transform. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Remove `node` and every descendant.
    ///
    /// The subtree is one contiguous block, so ancestors are adjusted once
    /// and the rows after the block shift down once. Returns the number of
    /// transforms removed.
    pub fn destroy_subtree(&mut self, node: Handle) -> usize {
        let Some(range) = self.checked(node, "destroy_subtree").map(|dense| {
            dense..dense + 1 + self.count_at(dense)
        }) else {
            return 0;
        };
        let parent = *self.store.get::<PARENT>(node);
        self.adjust_ancestors(parent, range.len() as u32, false);
        self.store.remove_range(range)
    }

    fn dense(&self, node: Handle) -> Option<usize> {
        self.store.dense_index(node).map(DenseIndex::get)
    }

    fn checked(&self, node: Handle, op: &'static str) -> Option<usize> {
        let dense = self.dense(node);
        if dense.is_none() {
            tracing::warn!(%node, op, "stale transform handle");
        }
        dense
    }

    #[inline]
    fn handle_at(&self, dense: usize) -> Handle {
        self.store.handle_at(DenseIndex::new(dense))
    }

    #[inline]
    fn count_at(&self, dense: usize) -> usize {
        self.store.column::<CHILD_COUNT>()[dense] as usize
    }

    // ------------------------------------------------------------------
    // Tree queries
    // ------------------------------------------------------------------

    /// Entity that owns `node`.
    pub fn owner(&self, node: Handle) -> Option<Entity> {
        self.store.try_get::<OWNER>(node).copied()
    }

    /// Parent of `node`, `None` for roots and stale handles.
    pub fn parent(&self, node: Handle) -> Option<Handle> {
        self.store
            .try_get::<PARENT>(node)
            .copied()
            .filter(|parent| !parent.is_null())
    }

    /// Total number of descendants.
    pub fn descendant_count(&self, node: Handle) -> usize {
        self.store
            .try_get::<CHILD_COUNT>(node)
            .map_or(0, |count| *count as usize)
    }

    /// Number of direct children.
    pub fn child_count(&self, node: Handle) -> usize {
        match self.dense(node) {
            Some(dense) => self.direct_children(dense).count(),
            None => 0,
        }
    }

    /// Dense positions of the direct children of the node at `dense`.
    fn direct_children(&self, dense: usize) -> DirectChildren<'_> {
        DirectChildren {
            counts: self.store.column::<CHILD_COUNT>(),
            next: dense + 1,
            end: dense + 1 + self.count_at(dense),
        }
    }

    /// Direct children in dense order.
    pub fn children(&self, node: Handle) -> Vec<Handle> {
        match self.dense(node) {
            Some(dense) => self
                .direct_children(dense)
                .map(|child| self.handle_at(child))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Top-level transforms in dense order.
    pub fn roots(&self) -> Vec<Handle> {
        DirectChildren {
            counts: self.store.column::<CHILD_COUNT>(),
            next: 0,
            end: self.len(),
        }
        .map(|dense| self.handle_at(dense))
        .collect()
    }

    /// Nodes sharing `node`'s parent, excluding `node`. Roots are siblings of
    /// each other.
    pub fn siblings(&self, node: Handle) -> Vec<Handle> {
        if !self.is_valid(node) {
            return Vec::new();
        }
        let mut siblings = match self.parent(node) {
            Some(parent) => self.children(parent),
            None => self.roots(),
        };
        siblings.retain(|sibling| *sibling != node);
        siblings
    }

    /// Position of `node` among its parent's children.
    pub fn sibling_index(&self, node: Handle) -> Option<usize> {
        if !self.is_valid(node) {
            return None;
        }
        let family = match self.parent(node) {
            Some(parent) => self.children(parent),
            None => self.roots(),
        };
        family.iter().position(|sibling| *sibling == node)
    }

    /// Top-most ancestor of `node` (itself for roots).
    pub fn root_of(&self, node: Handle) -> Option<Handle> {
        if !self.is_valid(node) {
            return None;
        }
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    /// Dense rows occupied by `node` and its descendants.
    pub fn subtree_range(&self, node: Handle) -> Option<Range<usize>> {
        let dense = self.dense(node)?;
        Some(dense..dense + 1 + self.count_at(dense))
    }

    /// Owners of `node` and its descendants in depth-first pre-order.
    pub fn subtree_owners(&self, node: Handle) -> &[Entity] {
        match self.subtree_range(node) {
            Some(range) => &self.store.column::<OWNER>()[range],
            None => &[],
        }
    }

    /// Every descendant in depth-first pre-order.
    pub fn descendants(&self, node: Handle) -> Vec<Handle> {
        match self.subtree_range(node) {
            Some(range) => (range.start + 1..range.end)
                .map(|dense| self.handle_at(dense))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All transforms in dense (depth-first) order.
    pub fn iter_dense(&self) -> impl Iterator<Item = Handle> + '_ {
        self.store.iter_handles()
    }

    pub fn flags(&self, node: Handle) -> DirtyFlags {
        self.store
            .try_get::<FLAGS>(node)
            .map_or(DirtyFlags::NONE, |flags| flags.changes())
    }

    // ------------------------------------------------------------------
    // Local state
    // ------------------------------------------------------------------

    pub fn local_matrix(&self, node: Handle) -> Option<Mat4> {
        self.store.try_get::<LOCAL>(node).copied()
    }

    pub fn local_position(&self, node: Handle) -> Option<Vec3> {
        self.local_matrix(node).map(|local| local.w_axis.truncate())
    }

    pub fn local_rotation(&self, node: Handle) -> Option<Quat> {
        self.local_matrix(node).map(|local| decompose(&local).1)
    }

    pub fn local_scale(&self, node: Handle) -> Option<Vec3> {
        self.local_matrix(node).map(|local| decompose(&local).2)
    }

    pub fn set_local_matrix(&mut self, node: Handle, local: Mat4) {
        let Some(dense) = self.checked(node, "set_local_matrix") else {
            return;
        };
        self.store.column_mut::<LOCAL>()[dense] = local;
        self.store.column_mut::<FLAGS>()[dense].insert(DirtyFlags::LOCAL);
        self.mark_subtree_stale(dense);
    }

    pub fn set_local(&mut self, node: Handle, translation: Vec3, rotation: Quat, scale: Vec3) {
        self.set_local_matrix(node, compose(translation, rotation, scale));
    }

    pub fn set_local_position(&mut self, node: Handle, position: Vec3) {
        if let Some(mut local) = self.local_matrix(node) {
            local.w_axis = position.extend(1.0);
            self.set_local_matrix(node, local);
        } else {
            tracing::warn!(%node, "set_local_position on stale transform");
        }
    }

    pub fn set_local_rotation(&mut self, node: Handle, rotation: Quat) {
        if let Some(local) = self.local_matrix(node) {
            let (translation, _, scale) = decompose(&local);
            self.set_local_matrix(node, compose(translation, rotation, scale));
        } else {
            tracing::warn!(%node, "set_local_rotation on stale transform");
        }
    }

    pub fn set_local_scale(&mut self, node: Handle, scale: Vec3) {
        if let Some(local) = self.local_matrix(node) {
            let (translation, rotation, _) = decompose(&local);
            self.set_local_matrix(node, compose(translation, rotation, scale));
        } else {
            tracing::warn!(%node, "set_local_scale on stale transform");
        }
    }

    fn mark_subtree_stale(&mut self, dense: usize) {
        let end = dense + 1 + self.count_at(dense);
        for flags in &mut self.store.column_mut::<FLAGS>()[dense..end] {
            flags.mark_stale();
        }
    }

    // ------------------------------------------------------------------
    // World state
    // ------------------------------------------------------------------

    /// Rebuild the cached world matrix of the node at `dense` if needed.
    ///
    /// Walks up while ancestors are stale, then recomputes back down that
    /// path. Ancestors precede descendants in dense order, and a clean
    /// ancestor's cache is correct because edits mark whole blocks stale.
    fn clean_if_dirty(&mut self, dense: usize) {
        if !self.store.column::<FLAGS>()[dense].is_stale() {
            return;
        }

        let mut path = vec![dense];
        let mut cursor = dense;
        loop {
            let parent = self.store.column::<PARENT>()[cursor];
            if parent.is_null() {
                break;
            }
            let parent_dense = self.store.dense_index_unchecked(parent).get();
            if !self.store.column::<FLAGS>()[parent_dense].is_stale() {
                break;
            }
            path.push(parent_dense);
            cursor = parent_dense;
        }

        for &row in path.iter().rev() {
            self.rebuild_row(row);
        }
    }

    /// Recompute one row from its parent's cache, which must be clean.
    fn rebuild_row(&mut self, dense: usize) {
        let parent = self.store.column::<PARENT>()[dense];
        let local = self.store.column::<LOCAL>()[dense];
        let world = if parent.is_null() {
            local
        } else {
            let parent_dense = self.store.dense_index_unchecked(parent).get();
            debug_assert!(parent_dense < dense, "parent stored after child");
            self.store.column::<WORLD>()[parent_dense] * local
        };
        self.store.column_mut::<WORLD>()[dense] = world;
        self.store.column_mut::<WORLD_INVERSE>()[dense] = world.inverse();
        self.store.column_mut::<FLAGS>()[dense].clear_stale();
    }

    /// Rebuild every stale world matrix in one dense pass.
    pub fn flush(&mut self) {
        for dense in 0..self.len() {
            if self.store.column::<FLAGS>()[dense].is_stale() {
                self.rebuild_row(dense);
            }
        }
    }

    /// Local-to-world matrix.
    pub fn world_matrix(&mut self, node: Handle) -> Option<Mat4> {
        let dense = self.checked(node, "world_matrix")?;
        self.clean_if_dirty(dense);
        Some(self.store.column::<WORLD>()[dense])
    }

    /// World-to-local matrix.
    pub fn world_to_local(&mut self, node: Handle) -> Option<Mat4> {
        let dense = self.checked(node, "world_to_local")?;
        self.clean_if_dirty(dense);
        Some(self.store.column::<WORLD_INVERSE>()[dense])
    }

    pub fn world_position(&mut self, node: Handle) -> Option<Vec3> {
        self.world_matrix(node).map(|world| world.w_axis.truncate())
    }

    pub fn world_rotation(&mut self, node: Handle) -> Option<Quat> {
        self.world_matrix(node).map(|world| decompose(&world).1)
    }

    pub fn world_scale(&mut self, node: Handle) -> Option<Vec3> {
        self.world_matrix(node).map(|world| decompose(&world).2)
    }

    /// Parent's world-to-local, identity for roots.
    fn parent_inverse(&mut self, dense: usize) -> Mat4 {
        let parent = self.store.column::<PARENT>()[dense];
        if parent.is_null() {
            return Mat4::IDENTITY;
        }
        let parent_dense = self.store.dense_index_unchecked(parent).get();
        self.clean_if_dirty(parent_dense);
        self.store.column::<WORLD_INVERSE>()[parent_dense]
    }

    /// Place `node` at `world` by rewriting its local transform.
    pub fn set_world_matrix(&mut self, node: Handle, world: Mat4) {
        let Some(dense) = self.checked(node, "set_world_matrix") else {
            return;
        };
        let local = self.parent_inverse(dense) * world;
        self.set_local_matrix(node, local);
    }

    pub fn set_world_position(&mut self, node: Handle, position: Vec3) {
        if let Some(mut world) = self.world_matrix(node) {
            world.w_axis = position.extend(1.0);
            self.set_world_matrix(node, world);
        }
    }

    pub fn set_world_rotation(&mut self, node: Handle, rotation: Quat) {
        if let Some(world) = self.world_matrix(node) {
            let (translation, _, scale) = decompose(&world);
            self.set_world_matrix(node, compose(translation, rotation, scale));
        }
    }

    // ------------------------------------------------------------------
    // Reparenting
    // ------------------------------------------------------------------

    /// Add `size` to (or remove it from) every ancestor starting at `parent`.
    fn adjust_ancestors(&mut self, mut parent: Handle, size: u32, attach: bool) {
        while !parent.is_null() {
            let dense = self.store.dense_index_unchecked(parent).get();
            let count = &mut self.store.column_mut::<CHILD_COUNT>()[dense];
            if attach {
                *count += size;
            } else {
                debug_assert!(*count >= size, "child_count underflow");
                *count -= size;
            }
            parent = self.store.column::<PARENT>()[dense];
        }
    }

    /// Make `node` a child of `new_parent`, keeping its world pose.
    ///
    /// The node's block of rows moves to the end of `new_parent`'s block.
    /// Self-parenting, parenting under one's own descendant and stale handles
    /// are rejected with a warning. Returns whether `node` ends up parented
    /// to `new_parent`.
    pub fn set_parent(&mut self, node: Handle, new_parent: Handle) -> bool {
        if new_parent.is_null() {
            return self.unset_parent(node);
        }
        let Some(start) = self.checked(node, "set_parent") else {
            return false;
        };
        let Some(parent_dense) = self.checked(new_parent, "set_parent target") else {
            return false;
        };
        if node == new_parent {
            tracing::warn!(%node, "a transform cannot be its own parent");
            return false;
        }
        let old_parent = self.store.column::<PARENT>()[start];
        if old_parent == new_parent {
            return true;
        }

        let size = self.count_at(start) + 1;
        if (start..start + size).contains(&parent_dense) {
            tracing::warn!(
                %node,
                %new_parent,
                "cannot parent a transform under its own descendant"
            );
            return false;
        }

        // Keep the world pose: express the current world matrix relative to
        // the new parent.
        self.clean_if_dirty(start);
        let world = self.store.column::<WORLD>()[start];
        self.clean_if_dirty(parent_dense);
        let local = self.store.column::<WORLD_INVERSE>()[parent_dense] * world;

        // Move the block so it ends where the new parent's block ends.
        let parent_end = parent_dense + 1 + self.count_at(parent_dense);
        let new_start = if start < parent_end {
            self.store.rotate_left(start..parent_end, size);
            parent_end - size
        } else {
            self.store.rotate_right(parent_end..start + size, size);
            parent_end
        };

        self.adjust_ancestors(old_parent, size as u32, false);
        self.adjust_ancestors(new_parent, size as u32, true);

        self.store.column_mut::<PARENT>()[new_start] = new_parent;
        self.store.column_mut::<LOCAL>()[new_start] = local;
        self.store.column_mut::<FLAGS>()[new_start].insert(DirtyFlags::PARENT);
        self.mark_subtree_stale(new_start);

        tracing::trace!(%node, %new_parent, from = start, to = new_start, "transform reparented");
        true
    }

    /// Detach `node` from its parent, keeping its world pose. The node's block
    /// moves to the end of the dense order.
    pub fn unset_parent(&mut self, node: Handle) -> bool {
        let Some(start) = self.checked(node, "unset_parent") else {
            return false;
        };
        let old_parent = self.store.column::<PARENT>()[start];
        if old_parent.is_null() {
            return true;
        }

        self.clean_if_dirty(start);
        let world = self.store.column::<WORLD>()[start];

        let size = self.count_at(start) + 1;
        let len = self.len();
        self.store.rotate_left(start..len, size);
        let new_start = len - size;

        self.adjust_ancestors(old_parent, size as u32, false);

        self.store.column_mut::<PARENT>()[new_start] = Handle::INVALID;
        self.store.column_mut::<LOCAL>()[new_start] = world;
        self.store.column_mut::<FLAGS>()[new_start].insert(DirtyFlags::PARENT);
        self.mark_subtree_stale(new_start);

        tracing::trace!(%node, from = start, to = new_start, "transform detached");
        true
    }

    // ------------------------------------------------------------------
    // Frame boundary
    // ------------------------------------------------------------------

    /// Clear the per-frame change flags. Pending world rebuilds are kept and
    /// happen on the next read.
    pub fn end_frame(&mut self) {
        let flags = self.store.column_mut::<FLAGS>();
        if flags.len() >= PARALLEL_CLEAR_THRESHOLD {
            flags.par_iter_mut().for_each(|f| f.clear_changes());
        } else {
            flags.iter_mut().for_each(|f| f.clear_changes());
        }
    }

    /// Check the contiguous-subtree layout against the parent links.
    ///
    /// O(n * depth); meant for tests and debug tooling.
    pub fn validate_layout(&self) -> bool {
        if !self.store.check_consistency() {
            return false;
        }
        let parents = self.store.column::<PARENT>();
        let len = self.len();
        for dense in 0..len {
            let parent = parents[dense];
            if !parent.is_null() {
                match self.dense(parent) {
                    Some(parent_dense) if parent_dense < dense => {}
                    _ => return false,
                }
            }
            let end = dense + 1 + self.count_at(dense);
            if end > len {
                return false;
            }
            for other in 0..len {
                let inside = other > dense && other < end;
                if inside != self.is_ancestor_dense(dense, other) {
                    return false;
                }
            }
        }
        true
    }

    fn is_ancestor_dense(&self, ancestor: usize, mut dense: usize) -> bool {
        let parents = self.store.column::<PARENT>();
        loop {
            let parent = parents[dense];
            if parent.is_null() {
                return false;
            }
            dense = self.store.dense_index_unchecked(parent).get();
            if dense == ancestor {
                return true;
            }
        }
    }
}

impl Default for TransformSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks sibling rows by skipping over each child's block.
struct DirectChildren<'a> {
    counts: &'a [u32],
    next: usize,
    end: usize,
}

impl Iterator for DirectChildren<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next += self.counts[current] as usize + 1;
        Some(current)
    }
}

impl ComponentSystem for TransformSystem {
    fn name(&self) -> &'static str {
        "Transform"
    }

    fn create(&mut self, entity: Entity) -> Handle {
        TransformSystem::create(self, entity)
    }

    fn destroy(&mut self, handle: Handle) {
        TransformSystem::destroy(self, handle)
    }

    fn is_valid(&self, handle: Handle) -> bool {
        self.store.is_valid(handle)
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn dependents(&self, handle: Handle, out: &mut Vec<Entity>) {
        if let Some(dense) = self.dense(handle) {
            let owners = self.store.column::<OWNER>();
            out.extend(self.direct_children(dense).map(|child| owners[child]));
        }
    }

    /// Scripting sees a transform as its local matrix.
    fn copy_out(&self, handle: Handle) -> Option<Box<dyn Any + Send>> {
        self.local_matrix(handle)
            .map(|local| Box::new(local) as Box<dyn Any + Send>)
    }

    fn copy_in(&mut self, handle: Handle, value: &dyn Any) -> bool {
        match value.downcast_ref::<Mat4>() {
            Some(local) if self.store.is_valid(handle) => {
                self.set_local_matrix(handle, *local);
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
