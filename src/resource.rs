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

//! Singleton, non-entity world state: the resource table.
//!
//! Resources are never stored in archetypes and never show up in queries —
//! they're reached by type, one value per type, for things like an
//! `EventStore<T>` or a shared asset server handle.

use rustc_hash::FxHashMap;

use crate::error::{EcsError, Result};
use crate::reflect::{type_hash, TypeHash};

type DropFn = unsafe fn(*mut u8);

struct ResourceSlot {
    ptr: *mut u8,
    name: &'static str,
    drop_fn: Option<DropFn>,
}

/// At most one value per type hash. Insertion order is not preserved.
#[derive(Default)]
pub struct ResourceTable {
    slots: FxHashMap<TypeHash, ResourceSlot>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` as the resource for `T`. Fails with
    /// `ResourceAlreadyExists` if one is already present.
    pub fn add_resource<T: 'static>(&mut self, value: T) -> Result<&mut T> {
        let hash = type_hash::<T>();
        if self.slots.contains_key(&hash) {
            return Err(EcsError::ResourceAlreadyExists(hash));
        }
        let boxed = Box::into_raw(Box::new(value));
        let drop_fn: Option<DropFn> = if std::mem::needs_drop::<T>() {
            Some(|ptr: *mut u8| unsafe {
                std::ptr::drop_in_place(ptr as *mut T);
            })
        } else {
            None
        };
        self.slots.insert(
            hash,
            ResourceSlot {
                ptr: boxed as *mut u8,
                name: std::any::type_name::<T>(),
                drop_fn,
            },
        );
        Ok(unsafe { &mut *boxed })
    }

    pub fn get_resource<T: 'static>(&self) -> Option<&T> {
        let slot = self.slots.get(&type_hash::<T>())?;
        Some(unsafe { &*(slot.ptr as *const T) })
    }

    pub fn get_resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let slot = self.slots.get_mut(&type_hash::<T>())?;
        Some(unsafe { &mut *(slot.ptr as *mut T) })
    }

    pub fn has_resource<T: 'static>(&self) -> bool {
        self.slots.contains_key(&type_hash::<T>())
    }

    /// Get-or-insert: returns the existing resource, or installs
    /// `init()`'s result and returns that. Used by event/`Local<T>` registration,
    /// which must not fail just because the resource already exists.
    pub fn get_or_insert_with<T: 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let hash = type_hash::<T>();
        if !self.slots.contains_key(&hash) {
            self.add_resource(init()).ok();
        }
        self.get_resource_mut::<T>()
            .expect("just inserted or already present")
    }

    /// Runs `T`'s destructor (if any) and frees its storage. No-op if absent.
    pub fn remove_resource<T: 'static>(&mut self) -> bool {
        let Some(slot) = self.slots.remove(&type_hash::<T>()) else {
            return false;
        };
        if let Some(drop_fn) = slot.drop_fn {
            unsafe { drop_fn(slot.ptr) };
        }
        let layout = std::alloc::Layout::new::<T>();
        if layout.size() > 0 {
            unsafe { std::alloc::dealloc(slot.ptr, layout) };
        }
        true
    }

    pub fn resource_name(&self, hash: TypeHash) -> Option<&'static str> {
        self.slots.get(&hash).map(|s| s.name)
    }

    pub fn clear(&mut self) {
        for (_, slot) in self.slots.drain() {
            if let Some(drop_fn) = slot.drop_fn {
                unsafe { drop_fn(slot.ptr) };
            }
        }
    }
}

impl Drop for ResourceTable {
    fn drop(&mut self) {
        for (_, slot) in self.slots.drain() {
            if let Some(drop_fn) = slot.drop_fn {
                unsafe { drop_fn(slot.ptr) };
            }
        }
    }
}
