//! Strongly-typed index newtypes.
//!
//! These types keep subdomain ranks and equation slots apart from plain
//! grid indices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Macro to generate index newtypes with common functionality.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident, $display_prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Create a new index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the raw index value.
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// First index (0).
            pub const ZERO: Self = Self(0);

            /// Increment index by one.
            #[inline]
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }

            /// Decrement index by one, saturating at zero.
            #[inline]
            pub fn prev(self) -> Self {
                Self(self.0.saturating_sub(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(idx: $name) -> usize {
                idx.0
            }
        }

        // Allow using as array index
        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }
    };
}

define_index!(
    /// Rank of a subdomain in the x-direction decomposition.
    ///
    /// Rank 0 owns the lowest rows; ranks increase with `i`.
    ///
    /// # Example
    ///
    /// ```
    /// use deeps2d::types::SubdomainRank;
    ///
    /// let rank = SubdomainRank::new(2);
    /// assert_eq!(rank.prev().get(), 1);
    /// assert_eq!(rank.to_string(), "D2");
    /// ```
    SubdomainRank,
    "D"
);

define_index!(
    /// Slot of an equation in the conserved vector `S`.
    ///
    /// # Example
    ///
    /// ```
    /// use deeps2d::types::EquationIndex;
    ///
    /// let k = EquationIndex::new(3);
    /// let s = vec![1.0, 0.0, 0.0, 2.5e5];
    /// assert_eq!(s[k], 2.5e5);
    /// ```
    EquationIndex,
    "Eq"
);
