//! Generational handles
//!
//! A handle is a single `u32` that packs a slot index (low bits) with a
//! generation counter (high bits). Stores keep one generation per slot and
//! bump it whenever the slot is released, so any copy of an old handle stops
//! resolving as soon as its slot is freed.
//!
//! Format: [8-bit generation | 24-bit index]
//!
//! The all-ones pattern is reserved for [`Handle::INVALID`], which means the
//! all-ones index can never be handed out.

use std::fmt;

/// Number of low bits holding the slot index.
pub const INDEX_BITS: u32 = 24;

/// Number of high bits holding the generation.
pub const GENERATION_BITS: u32 = 8;

/// Mask selecting the index bits.
pub const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Mask selecting the generation bits once shifted down.
pub const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Largest index that can be packed. `INDEX_MASK` itself is reserved for the
/// null handle.
pub const MAX_INDEX: u32 = INDEX_MASK - 1;

/// Per-slot generation counter. Wraps after `2^GENERATION_BITS` reuses.
pub type Generation = u8;

/// Opaque reference to a slot in a store.
///
/// Two handles are equal iff their packed bits are equal. Liveness can only be
/// answered by the store that issued the handle (see `ComponentStore::is_valid`
/// and `EntityRegistry::alive`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// The null handle.
    pub const INVALID: Handle = Handle(u32::MAX);

    /// Pack an index and a generation.
    ///
    /// Running out of index space is fatal: wrapping silently would alias
    /// live handles.
    pub fn pack(index: u32, generation: Generation) -> Self {
        check_index(index);
        Self(((generation as u32) << INDEX_BITS) | index)
    }

    /// Split into `(index, generation)`.
    #[inline]
    pub const fn unpack(self) -> (u32, Generation) {
        (self.index(), self.generation())
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    #[inline]
    pub const fn generation(self) -> Generation {
        ((self.0 >> INDEX_BITS) & GENERATION_MASK) as Generation
    }

    /// True for [`Handle::INVALID`].
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    /// Raw packed value (for scripting and editor plumbing).
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Handle(null)")
        } else {
            write!(f, "Handle({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

/// Panic if `index` does not fit a handle. Allocators call this before
/// growing their tables.
#[inline]
pub(crate) fn check_index(index: u32) {
    if index > MAX_INDEX {
        tracing::error!(index, max = MAX_INDEX, "handle index space exhausted");
        panic!("handle index {index} exceeds the {INDEX_BITS}-bit index space");
    }
}

/// Next generation for a slot being released.
#[inline]
pub(crate) fn next_generation(generation: Generation) -> Generation {
    generation.wrapping_add(1)
}
