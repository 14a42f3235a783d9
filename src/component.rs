// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component and Bundle traits
//!
//! Components are data attached to entities.
//! Bundles group multiple components for spawning.

use smallvec::{smallvec, SmallVec};

use crate::archetype::Archetype;
use crate::reflect::{type_hash, TypeHash};

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Bundle of components
///
/// Allows spawning entities with multiple components at once.
pub trait Bundle: Send + Sync + 'static {
    /// Get type hashes of all components in bundle, ascending-sorted (the
    /// signature ordering rule — component order within a signature is
    /// otherwise opaque).
    fn sorted_type_hashes() -> SmallVec<[TypeHash; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Ensure component columns exist in an archetype
    fn register_components(archetype: &mut Archetype)
    where
        Self: Sized;

    /// Write components to raw pointers, one per component in declaration
    /// order (not signature order — callers resolve the column index by hash).
    ///
    /// # Safety
    /// Caller must ensure pointers are valid and properly aligned
    unsafe fn write_components(self, archetype: &Archetype, row: usize);
}

// DO NOT implement Bundle for T: Component
// This conflicts with tuple implementations
// Instead, implement only for tuples

// Macro for tuple Bundle implementations
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn sorted_type_hashes() -> SmallVec<[TypeHash; MAX_BUNDLE_COMPONENTS]> {
                let mut hashes: SmallVec<[TypeHash; MAX_BUNDLE_COMPONENTS]> =
                    smallvec![$(type_hash::<$T>()),*];
                hashes.sort_unstable();
                hashes
            }

            fn register_components(archetype: &mut Archetype) {
                $(archetype.register_component::<$T>();)*
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, archetype: &Archetype, row: usize) {
                let ($($T,)*) = self;
                $(
                    unsafe {
                        let ptr = archetype.column_ptr_mut(type_hash::<$T>(), row);
                        std::ptr::write(ptr as *mut $T, $T);
                    }
                )*
            }
        }
    };
}

impl Bundle for () {
    fn sorted_type_hashes() -> SmallVec<[TypeHash; MAX_BUNDLE_COMPONENTS]> {
        smallvec![]
    }

    fn register_components(_archetype: &mut Archetype) {}

    unsafe fn write_components(self, _archetype: &Archetype, _row: usize) {}
}

// Implement for tuples of 1-8 components
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    #![allow(dead_code)]
    use super::*;

    #[test]
    fn single_component_hash() {
        #[derive(Debug, Clone, Copy)]
        struct Position {
            x: f32,
            y: f32,
        }

        let hashes = <(Position,)>::sorted_type_hashes();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0], type_hash::<Position>());
    }

    #[test]
    fn multiple_components_sorted_ascending() {
        #[derive(Debug, Clone, Copy)]
        struct Position {
            x: f32,
        }

        #[derive(Debug, Clone, Copy)]
        struct Velocity {
            x: f32,
        }

        let hashes = <(Position, Velocity)>::sorted_type_hashes();
        assert_eq!(hashes.len(), 2);
        assert!(hashes[0] <= hashes[1]);
    }
}
