//! Densely numbered entity references as mapping keys.
//!
//! Arena-style IR data structures (types, values, instructions, blocks,
//! functions, globals) are given a stable `u32` index rather than a real
//! pointer: indices stay valid across `Vec` reallocation, are `Copy`, and
//! are cheap to compare/hash. [`EntityRef`] is the trait every such index
//! implements; [`PrimaryMap`] allocates fresh entities and owns their data,
//! [`SecondaryMap`] attaches extra data to entities it does not own.

mod iter;
mod keys;
mod map;
mod primary;
mod secondary;

pub use crate::iter::{Iter, IterMut};
pub use crate::keys::Keys;
pub use crate::primary::PrimaryMap;
pub use crate::secondary::SecondaryMap;

/// A type that can be used as a dense index into a vector-based map.
///
/// Implementors wrap a `u32` and are `Copy`. The `entity_impl!` macro
/// generates the boilerplate for a newtype wrapping `u32`.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a linear index.
    fn new(index: usize) -> Self;

    /// Get the index of this reference.
    fn index(self) -> usize;
}

/// Macro that generates the common `EntityRef` boilerplate for a
/// `struct Foo(u32)` newtype, along with `Display`/`Debug` in the `foo12`
/// textual-IR style used throughout the `armcc` text format (spec.md §6).
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $entity {
            /// Create a new instance from a `u32`.
            #[allow(dead_code)]
            pub fn from_u32(x: u32) -> Self {
                $entity(x)
            }

            /// Return the underlying index as a `u32`.
            #[allow(dead_code)]
            pub fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", stringify!($entity), self.0)
            }
        }
    };

    ($entity:ident, $display_prefix:expr) => {
        $crate::entity_impl!($entity);

        impl core::fmt::Display for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }
    };
}
