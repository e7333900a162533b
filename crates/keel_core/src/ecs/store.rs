// store.rs - Generational sparse/dense component store
//
// Rows live densely in one buffer per column (see `row.rs`). Handles name a
// sparse slot; the sparse table maps that slot to the row's current dense
// position and the dense-to-sparse table maps back. Removal swap-removes the
// row so iteration never sees gaps, at the cost of dense positions moving.

use crate::config::DEFAULT_REUSE_THRESHOLD;
use crate::ecs::handle::{check_index, next_generation, Generation, Handle};
use crate::ecs::row::{ColumnAt, Row};
use std::collections::VecDeque;
use std::ops::Range;

/// Position of a row in the dense column buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DenseIndex(u32);

impl DenseIndex {
    /// Marks a sparse slot with no row behind it.
    pub const INVALID: DenseIndex = DenseIndex(u32::MAX);

    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

/// Stable slot number carried inside a handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SparseIndex(u32);

impl SparseIndex {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Structure-of-arrays container addressed by generation-checked handles.
///
/// `R` is a tuple of column types, e.g. `ComponentStore<(Vec3, Quat)>`.
/// Columns are read with `get::<N>` / `get_mut::<N>` where `N` is the column
/// position in the tuple.
///
/// Invariant: for every occupied dense index `d`,
/// `sparse[dense_to_sparse[d]] == d`.
pub struct ComponentStore<R: Row> {
    columns: R::Columns,
    sparse: Vec<DenseIndex>,
    dense_to_sparse: Vec<SparseIndex>,
    generations: Vec<Generation>,
    free: VecDeque<SparseIndex>,
    reuse_threshold: usize,
}

impl<R: Row> ComponentStore<R> {
    pub fn new() -> Self {
        Self::with_reuse_threshold(DEFAULT_REUSE_THRESHOLD)
    }

    /// Create a store that only recycles sparse slots once more than
    /// `reuse_threshold` of them are waiting in the free list.
    pub fn with_reuse_threshold(reuse_threshold: usize) -> Self {
        Self {
            columns: R::Columns::default(),
            sparse: Vec::new(),
            dense_to_sparse: Vec::new(),
            generations: Vec::new(),
            free: VecDeque::new(),
            reuse_threshold,
        }
    }

    /// Reserve room for `capacity` dense rows up front.
    pub fn with_capacity(capacity: usize, reuse_threshold: usize) -> Self {
        let mut store = Self::with_reuse_threshold(reuse_threshold);
        R::reserve_exact(&mut store.columns, capacity);
        store.dense_to_sparse.reserve_exact(capacity);
        store.sparse.reserve_exact(capacity);
        store.generations.reserve_exact(capacity);
        store
    }

    /// Number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense_to_sparse.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows the column buffers can hold before the next growth step.
    #[inline]
    pub fn capacity(&self) -> usize {
        R::capacity(&self.columns)
    }

    /// Number of sparse slots ever allocated (live or free).
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.sparse.len()
    }

    /// Number of released sparse slots waiting for reuse.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn reuse_threshold(&self) -> usize {
        self.reuse_threshold
    }

    /// Append a row and return the handle that names it.
    pub fn add(&mut self, row: R) -> Handle {
        let len = self.len();
        if len == self.capacity() {
            // Geometric growth: capacity * 2 + 1.
            let target = len * 2 + 1;
            R::reserve_exact(&mut self.columns, target - len);
            self.dense_to_sparse
                .reserve_exact(target - self.dense_to_sparse.len());
        }

        let slot = self.allocate_slot();
        let dense = DenseIndex::new(len);
        R::push(&mut self.columns, row);
        self.dense_to_sparse.push(slot);
        self.sparse[slot.get()] = dense;

        Handle::pack(slot.raw(), self.generations[slot.get()])
    }

    fn allocate_slot(&mut self) -> SparseIndex {
        if self.free.len() > self.reuse_threshold {
            if let Some(slot) = self.free.pop_front() {
                return slot;
            }
        }
        let slot = SparseIndex::new(self.sparse.len() as u32);
        check_index(slot.raw());
        self.sparse.push(DenseIndex::INVALID);
        self.generations.push(0);
        slot
    }

    /// Whether `handle` still names a live row.
    #[inline]
    pub fn is_valid(&self, handle: Handle) -> bool {
        if handle.is_null() {
            return false;
        }
        let (index, generation) = handle.unpack();
        let index = index as usize;
        index < self.generations.len()
            && self.generations[index] == generation
            && self.sparse[index].is_valid()
    }

    /// Dense position of a live row, `None` for stale handles.
    #[inline]
    pub fn dense_index(&self, handle: Handle) -> Option<DenseIndex> {
        if self.is_valid(handle) {
            Some(self.sparse[handle.index() as usize])
        } else {
            None
        }
    }

    /// Dense position of a row the caller knows is live. Panics on a stale
    /// handle.
    #[inline]
    pub fn dense_index_unchecked(&self, handle: Handle) -> DenseIndex {
        assert!(self.is_valid(handle), "stale handle {handle:?}");
        self.sparse[handle.index() as usize]
    }

    /// Handle for the row currently at `dense`.
    #[inline]
    pub fn handle_at(&self, dense: DenseIndex) -> Handle {
        let slot = self.dense_to_sparse[dense.get()];
        Handle::pack(slot.raw(), self.generations[slot.get()])
    }

    /// Handles of all live rows in dense order.
    pub fn iter_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.dense_to_sparse
            .iter()
            .map(|slot| Handle::pack(slot.raw(), self.generations[slot.get()]))
    }

    /// Borrow column `N` of the row behind `handle`.
    ///
    /// The caller is expected to have validated `handle`. A stale handle
    /// panics; use [`try_get`](Self::try_get) when liveness is unknown.
    #[inline]
    pub fn get<const N: usize>(&self, handle: Handle) -> &<R as ColumnAt<N>>::Value
    where
        R: ColumnAt<N>,
    {
        let dense = self.dense_index_unchecked(handle);
        &R::column(&self.columns)[dense.get()]
    }

    #[inline]
    pub fn get_mut<const N: usize>(&mut self, handle: Handle) -> &mut <R as ColumnAt<N>>::Value
    where
        R: ColumnAt<N>,
    {
        let dense = self.dense_index_unchecked(handle);
        &mut R::column_mut(&mut self.columns)[dense.get()]
    }

    /// Generation-checked variant of [`get`](Self::get).
    #[inline]
    pub fn try_get<const N: usize>(&self, handle: Handle) -> Option<&<R as ColumnAt<N>>::Value>
    where
        R: ColumnAt<N>,
    {
        let dense = self.dense_index(handle)?;
        R::column(&self.columns).get(dense.get())
    }

    #[inline]
    pub fn try_get_mut<const N: usize>(
        &mut self,
        handle: Handle,
    ) -> Option<&mut <R as ColumnAt<N>>::Value>
    where
        R: ColumnAt<N>,
    {
        let dense = self.dense_index(handle)?;
        R::column_mut(&mut self.columns).get_mut(dense.get())
    }

    /// Column `N` by dense position.
    #[inline]
    pub fn column<const N: usize>(&self) -> &[<R as ColumnAt<N>>::Value]
    where
        R: ColumnAt<N>,
    {
        R::column(&self.columns)
    }

    #[inline]
    pub fn column_mut<const N: usize>(&mut self) -> &mut [<R as ColumnAt<N>>::Value]
    where
        R: ColumnAt<N>,
    {
        R::column_mut(&mut self.columns)
    }

    /// Remove the row behind `handle` by swap-removal.
    ///
    /// The last dense row moves into the freed position across every column.
    /// Returns the removed row, or `None` (with a warning) for a stale handle.
    pub fn remove(&mut self, handle: Handle) -> Option<R> {
        let Some(dense) = self.dense_index(handle) else {
            tracing::warn!(%handle, "remove on stale component handle");
            return None;
        };
        let dense = dense.get();
        let last = self.len() - 1;

        let row = R::swap_remove(&mut self.columns, dense);
        self.dense_to_sparse.swap_remove(dense);
        if dense != last {
            let moved = self.dense_to_sparse[dense];
            self.sparse[moved.get()] = DenseIndex::new(dense);
        }
        self.release_slot(SparseIndex::new(handle.index()));
        Some(row)
    }

    /// Remove the row behind `handle`, shifting later rows down by one so the
    /// relative order of every other row is preserved. O(len - dense).
    pub fn remove_ordered(&mut self, handle: Handle) -> Option<R> {
        let Some(dense) = self.dense_index(handle) else {
            tracing::warn!(%handle, "ordered remove on stale component handle");
            return None;
        };
        let len = self.len();
        self.rotate_left(dense.get()..len, 1);
        let row = R::pop(&mut self.columns)?;
        self.dense_to_sparse.pop();
        self.release_slot(SparseIndex::new(handle.index()));
        Some(row)
    }

    /// Remove every row in the dense `range`, shifting the tail down once.
    ///
    /// Rows outside the range keep their relative order. Returns the number
    /// of rows removed. O(len - range.start).
    pub fn remove_range(&mut self, range: Range<usize>) -> usize {
        let len = self.len();
        assert!(range.end <= len, "removal past dense end");
        if range.is_empty() {
            return 0;
        }
        let count = range.len();
        for dense in range.clone() {
            self.release_slot(self.dense_to_sparse[dense]);
        }
        R::rotate_left(&mut self.columns, range.start..len, count);
        R::truncate(&mut self.columns, len - count);
        self.dense_to_sparse.drain(range.clone());
        self.fix_sparse(range.start..len - count);
        count
    }

    fn release_slot(&mut self, slot: SparseIndex) {
        let index = slot.get();
        self.sparse[index] = DenseIndex::INVALID;
        self.generations[index] = next_generation(self.generations[index]);
        self.free.push_back(slot);
    }

    /// Rotate the dense rows in `range` left by `mid`, in every column, and
    /// repair the sparse table for every row that moved.
    pub fn rotate_left(&mut self, range: Range<usize>, mid: usize) {
        assert!(range.end <= self.len(), "rotation past dense end");
        if range.is_empty() || mid % range.len() == 0 {
            return;
        }
        R::rotate_left(&mut self.columns, range.clone(), mid);
        self.dense_to_sparse[range.clone()].rotate_left(mid);
        self.fix_sparse(range);
    }

    /// Rotate the dense rows in `range` right by `k`.
    pub fn rotate_right(&mut self, range: Range<usize>, k: usize) {
        assert!(range.end <= self.len(), "rotation past dense end");
        if range.is_empty() || k % range.len() == 0 {
            return;
        }
        R::rotate_right(&mut self.columns, range.clone(), k);
        self.dense_to_sparse[range.clone()].rotate_right(k);
        self.fix_sparse(range);
    }

    fn fix_sparse(&mut self, range: Range<usize>) {
        for dense in range {
            let slot = self.dense_to_sparse[dense];
            self.sparse[slot.get()] = DenseIndex::new(dense);
        }
    }

    /// Resize to exactly `len` live rows.
    ///
    /// Shrinking removes rows from the dense tail and invalidates their
    /// handles. Growing appends default rows and returns their handles.
    pub fn resize(&mut self, len: usize) -> Vec<Handle>
    where
        R: Default,
    {
        let mut created = Vec::new();
        while self.len() > len {
            let last = self.len() - 1;
            let slot = self.dense_to_sparse[last];
            R::truncate(&mut self.columns, last);
            self.dense_to_sparse.pop();
            self.release_slot(slot);
        }
        if len > self.len() {
            created.reserve(len - self.len());
            while self.len() < len {
                created.push(self.add(R::default()));
            }
        }
        created
    }

    /// Remove every row. Outstanding handles become invalid.
    pub fn clear(&mut self) {
        for dense in 0..self.len() {
            let slot = self.dense_to_sparse[dense];
            self.sparse[slot.get()] = DenseIndex::INVALID;
            self.generations[slot.get()] = next_generation(self.generations[slot.get()]);
            self.free.push_back(slot);
        }
        R::truncate(&mut self.columns, 0);
        self.dense_to_sparse.clear();
    }

    /// Check the sparse/dense cross-links. Used by tests and debug tooling.
    pub fn check_consistency(&self) -> bool {
        if R::len(&self.columns) != self.dense_to_sparse.len() {
            return false;
        }
        let linked = self
            .dense_to_sparse
            .iter()
            .enumerate()
            .all(|(dense, slot)| self.sparse[slot.get()] == DenseIndex::new(dense));
        let live = self.sparse.iter().filter(|d| d.is_valid()).count();
        linked && live == self.len()
    }
}

impl<R: Row> Default for ComponentStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
