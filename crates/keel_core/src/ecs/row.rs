// row.rs - Column layout for structure-of-arrays stores
//
// A row type is a tuple of column value types. Its `Columns` is the matching
// tuple of `Vec`s, one contiguous buffer per attribute, all kept the same
// length and index-aligned. Every row operation touches every column in
// lockstep, so a dense index always addresses one logical row.

use std::ops::Range;

/// A tuple of column value types that can be stored column-wise.
pub trait Row: Sized + Send + Sync + 'static {
    /// One `Vec` per column.
    type Columns: Default + Send + Sync;

    /// Number of columns in the row.
    const WIDTH: usize;

    fn len(columns: &Self::Columns) -> usize;

    fn capacity(columns: &Self::Columns) -> usize;

    fn reserve_exact(columns: &mut Self::Columns, additional: usize);

    fn push(columns: &mut Self::Columns, row: Self);

    fn pop(columns: &mut Self::Columns) -> Option<Self>;

    /// Remove `index`, moving the last row into its place in every column.
    fn swap_remove(columns: &mut Self::Columns, index: usize) -> Self;

    fn truncate(columns: &mut Self::Columns, len: usize);

    /// Rotate `range` left by `mid` rows in every column.
    fn rotate_left(columns: &mut Self::Columns, range: Range<usize>, mid: usize);

    /// Rotate `range` right by `k` rows in every column.
    fn rotate_right(columns: &mut Self::Columns, range: Range<usize>, k: usize);
}

/// Positional access to column `N` of a row type.
pub trait ColumnAt<const N: usize>: Row {
    type Value: Send + Sync + 'static;

    fn column(columns: &Self::Columns) -> &[Self::Value];

    fn column_mut(columns: &mut Self::Columns) -> &mut [Self::Value];
}

macro_rules! impl_row {
    (@columns $all:tt $($idx:tt => $T:ident),+) => {
        $( impl_row!(@column $all $idx $T); )+
    };
    (@column [$($All:ident),+] $idx:tt $T:ident) => {
        impl<$($All: Send + Sync + 'static),+> ColumnAt<$idx> for ($($All,)+) {
            type Value = $T;

            #[inline]
            fn column(columns: &Self::Columns) -> &[$T] {
                &columns.$idx
            }

            #[inline]
            fn column_mut(columns: &mut Self::Columns) -> &mut [$T] {
                &mut columns.$idx
            }
        }
    };
    ($width:expr; $($idx:tt => $T:ident),+) => {
        impl<$($T: Send + Sync + 'static),+> Row for ($($T,)+) {
            type Columns = ($(Vec<$T>,)+);

            const WIDTH: usize = $width;

            #[inline]
            fn len(columns: &Self::Columns) -> usize {
                columns.0.len()
            }

            #[inline]
            fn capacity(columns: &Self::Columns) -> usize {
                let mut capacity = usize::MAX;
                $( capacity = capacity.min(columns.$idx.capacity()); )+
                capacity
            }

            fn reserve_exact(columns: &mut Self::Columns, additional: usize) {
                $( columns.$idx.reserve_exact(additional); )+
            }

            #[inline]
            fn push(columns: &mut Self::Columns, row: Self) {
                $( columns.$idx.push(row.$idx); )+
            }

            fn pop(columns: &mut Self::Columns) -> Option<Self> {
                if columns.0.is_empty() {
                    return None;
                }
                Some(($( columns.$idx.pop()?, )+))
            }

            #[inline]
            fn swap_remove(columns: &mut Self::Columns, index: usize) -> Self {
                ($( columns.$idx.swap_remove(index), )+)
            }

            fn truncate(columns: &mut Self::Columns, len: usize) {
                $( columns.$idx.truncate(len); )+
            }

            fn rotate_left(columns: &mut Self::Columns, range: Range<usize>, mid: usize) {
                $( columns.$idx[range.clone()].rotate_left(mid); )+
            }

            fn rotate_right(columns: &mut Self::Columns, range: Range<usize>, k: usize) {
                $( columns.$idx[range.clone()].rotate_right(k); )+
            }
        }

        impl_row!(@columns [$($T),+] $($idx => $T),+);
    };
}

impl_row!(1; 0 => A);
impl_row!(2; 0 => A, 1 => B);
impl_row!(3; 0 => A, 1 => B, 2 => C);
impl_row!(4; 0 => A, 1 => B, 2 => C, 3 => D);
impl_row!(5; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_row!(6; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);
impl_row!(7; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G);
impl_row!(8; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G, 7 => H);
