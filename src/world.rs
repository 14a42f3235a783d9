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

//! Entity-level API built on top of [`crate::store::ArchetypeStore`]:
//! spawning, component add/remove (with archetype migration), and lookups.
//! `World` does not allocate entity ids itself — that is
//! [`crate::manager::Manager`]'s job; `World` only ever operates on ids it is
//! handed.

use crate::archetype::{signature_of, ArchetypeSignature};
use crate::component::{Bundle, Component};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::reflect::{type_hash, TypeHash};
use crate::store::ArchetypeStore;

/// An owned snapshot of one component's bytes, as read back from an
/// archetype row. Used by [`World::get_all_components`] and by the
/// serialization format in `serialization.rs`.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    pub hash: TypeHash,
    pub bytes: Vec<u8>,
}

pub struct World {
    store: ArchetypeStore,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            store: ArchetypeStore::new(),
        }
    }

    pub fn store(&self) -> &ArchetypeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ArchetypeStore {
        &mut self.store
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    /// Add `bundle`'s components to `entity`. Fast path if `entity` has no
    /// prior archetype (the initial spawn); migration path if it does, in
    /// which case new components overwrite same-typed old ones.
    pub fn add<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> Result<()> {
        if !self.store.contains(entity) {
            let sig = signature_of(B::sorted_type_hashes());
            let idx = self
                .store
                .get_or_create_with(sig, |a| B::register_components(a));
            let arch = self.store.archetype_mut(idx);
            let row = arch.append_row(entity)?;
            unsafe {
                bundle.write_components(arch, row);
            }
            self.store.set_location(entity, idx, row);
            return Ok(());
        }

        self.migrate_add(entity, bundle)
    }

    /// Same as repeated [`World::add`] calls, but reserves row capacity for
    /// `entities.len()` up front on the (single, shared) target archetype.
    /// Every entity must be new (no prior archetype).
    pub fn add_batch<B: Bundle + Clone>(&mut self, entities: &[EntityId], bundle: B) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let sig = signature_of(B::sorted_type_hashes());
        let idx = self
            .store
            .get_or_create_with(sig, |a| B::register_components(a));
        let arch = self.store.archetype_mut(idx);
        arch.reserve_rows(entities.len());
        for &entity in entities {
            let row = arch.append_row(entity)?;
            unsafe {
                bundle.clone().write_components(arch, row);
            }
            self.store.set_location(entity, idx, row);
        }
        Ok(())
    }

    fn migrate_add<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = tracing::trace_span!("archetype_migration", entity = ?entity).entered();

        let old_loc = self.store.get(entity).ok_or(EcsError::EntityNotAlive)?;
        let old_infos = self.store.archetype(old_loc.archetype_id).column_infos();
        let new_hashes = B::sorted_type_hashes();

        let mut merged: ArchetypeSignature = old_infos.iter().map(|i| i.hash).collect();
        merged.extend(new_hashes.iter().copied());
        let merged = signature_of(merged);

        // Snapshot bytes for every old column the new bundle does not overwrite.
        let mut carried = Vec::new();
        {
            let old_arch = self.store.archetype(old_loc.archetype_id);
            for info in &old_infos {
                if new_hashes.binary_search(&info.hash).is_err() {
                    let bytes = old_arch
                        .get_column(info.hash)
                        .and_then(|c| c.get_bytes(old_loc.archetype_row))
                        .map(|b| b.to_vec())
                        .unwrap_or_default();
                    carried.push((info.hash, bytes));
                }
            }
        }

        let target_idx = self.store.get_or_create_with(merged, |a| {
            for info in &old_infos {
                a.register_column(*info);
            }
            B::register_components(a);
        });

        self.store.remove(entity);

        let arch = self.store.archetype_mut(target_idx);
        let row = arch.append_row(entity)?;
        for (hash, bytes) in carried {
            unsafe {
                let ptr = arch.column_ptr_mut(hash, row);
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
            }
        }
        unsafe {
            bundle.write_components(arch, row);
        }
        self.store.set_location(entity, target_idx, row);
        Ok(())
    }

    /// Remove component `T` from `entity`. No-op if `T` is absent.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let hash = type_hash::<T>();
        if !self.has_component::<T>(entity) {
            return Ok(());
        }
        let old_loc = self.store.get(entity).ok_or(EcsError::EntityNotAlive)?;
        let old_infos = self.store.archetype(old_loc.archetype_id).column_infos();

        let target_sig = signature_of(
            old_infos
                .iter()
                .map(|i| i.hash)
                .filter(|h| *h != hash)
                .collect(),
        );

        let mut carried = Vec::new();
        {
            let old_arch = self.store.archetype(old_loc.archetype_id);
            for info in &old_infos {
                if info.hash == hash {
                    continue;
                }
                let bytes = old_arch
                    .get_column(info.hash)
                    .and_then(|c| c.get_bytes(old_loc.archetype_row))
                    .map(|b| b.to_vec())
                    .unwrap_or_default();
                carried.push((info.hash, bytes));
            }
        }

        let target_idx = self.store.get_or_create_with(target_sig, |a| {
            for info in &old_infos {
                if info.hash != hash {
                    a.register_column(*info);
                }
            }
        });

        self.store.remove(entity);

        let arch = self.store.archetype_mut(target_idx);
        let row = arch.append_row(entity)?;
        for (h, bytes) in carried {
            unsafe {
                let ptr = arch.column_ptr_mut(h, row);
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
            }
        }
        self.store.set_location(entity, target_idx, row);
        Ok(())
    }

    /// Fully remove `entity` and every component it carries.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        self.store
            .remove(entity)
            .map(|_| ())
            .ok_or(EcsError::EntityNotAlive)
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let loc = self.store.get(entity)?;
        self.store.archetype(loc.archetype_id).get::<T>(loc.archetype_row)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let loc = self.store.get(entity)?;
        self.store
            .archetype_mut(loc.archetype_id)
            .get_mut::<T>(loc.archetype_row)
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        let Some(loc) = self.store.get(entity) else {
            return false;
        };
        self.store.archetype(loc.archetype_id).has_column(type_hash::<T>())
    }

    /// Snapshot of every component currently on `entity`, by (hash, bytes).
    pub fn get_all_components(&self, entity: EntityId) -> Option<Vec<ComponentInstance>> {
        let loc = self.store.get(entity)?;
        let arch = self.store.archetype(loc.archetype_id);
        Some(
            arch.column_infos()
                .into_iter()
                .map(|info| ComponentInstance {
                    hash: info.hash,
                    bytes: arch
                        .get_column(info.hash)
                        .and_then(|c| c.get_bytes(loc.archetype_row))
                        .map(|b| b.to_vec())
                        .unwrap_or_default(),
                })
                .collect(),
        )
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Total live entities across every archetype. O(archetype count), not cached.
    pub fn entity_count(&self) -> usize {
        self.store.archetypes().iter().map(|a| a.len()).sum()
    }
}
