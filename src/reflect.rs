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

//! Stable type identity and per-type layout metadata.
//!
//! Every component, resource, and relation kind needs a 64-bit identity that is
//! stable for the lifetime of one build of this binary. Rust already gives us
//! exactly that guarantee in [`std::any::TypeId`]; we fold a `TypeId` down to a
//! `u64` with a fixed-seed hash so it can live in the byte-oriented structures
//! (archetype signatures, the wire format in `serialization.rs`) the rest of the
//! crate is built around, instead of inventing a second identity scheme.

use rustc_hash::FxHasher;
use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::mem::{align_of, size_of};

/// A 64-bit, build-stable identity for a Rust type.
pub type TypeHash = u64;

/// Fold a [`TypeId`] into a [`TypeHash`].
///
/// `FxHasher` is deterministic (no per-process random seed, unlike the default
/// `ahash`/`SipHash` used elsewhere for general-purpose maps), so two values of
/// type `T` hashed in the same binary always produce the same `TypeHash` — the
/// property the external byte format in `serialization.rs` depends on.
pub fn type_hash<T: 'static>() -> TypeHash {
    let mut hasher = FxHasher::default();
    TypeId::of::<T>().hash(&mut hasher);
    hasher.finish()
}

/// Size, alignment, and destructor for one component type, keyed by [`TypeHash`].
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    pub hash: TypeHash,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub drop_fn: Option<unsafe fn(*mut u8)>,
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

unsafe fn drop_in_place_typed<T>(ptr: *mut u8) {
    unsafe {
        std::ptr::drop_in_place(ptr as *mut T);
    }
}

/// Build the layout descriptor for `T`, including its drop glue when `T` needs it.
pub fn component_info<T: 'static>() -> ComponentInfo {
    ComponentInfo {
        hash: type_hash::<T>(),
        name: std::any::type_name::<T>(),
        size: size_of::<T>(),
        align: align_of::<T>(),
        drop_fn: if std::mem::needs_drop::<T>() {
            Some(drop_in_place_typed::<T>)
        } else {
            None
        },
    }
}
