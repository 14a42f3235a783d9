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

//! Archetype store: signature→archetype mapping plus the entity→(archetype,
//! row) sparse index. This is the layer [`crate::world::World`] builds
//! entity-level semantics (migration, component add/remove) on top of.

use rustc_hash::FxHashMap;

use crate::archetype::{Archetype, ArchetypeSignature};
use crate::entity::{EntityId, EntityLocation};
use crate::reflect::ComponentInfo;
use crate::sparse_set::SparseSet;

/// Signature → archetype map, plus the sparse entity index.
#[derive(Default)]
pub struct ArchetypeStore {
    archetypes: Vec<Archetype>,
    index: FxHashMap<ArchetypeSignature, usize>,
    sparse: SparseSet<EntityLocation>,
}

impl ArchetypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the archetype for `signature`, creating it if it doesn't exist
    /// yet. `register` is invoked exactly once, only on creation, to install
    /// the signature's component columns.
    pub fn get_or_create_with(
        &mut self,
        signature: ArchetypeSignature,
        register: impl FnOnce(&mut Archetype),
    ) -> usize {
        if let Some(&idx) = self.index.get(&signature) {
            return idx;
        }
        let mut archetype = Archetype::new(signature.clone());
        register(&mut archetype);
        let idx = self.archetypes.len();
        self.archetypes.push(archetype);
        self.index.insert(signature, idx);
        idx
    }

    /// Convenience over [`ArchetypeStore::get_or_create_with`] for a known
    /// list of column layouts.
    pub fn get_or_create(&mut self, signature: ArchetypeSignature, infos: &[ComponentInfo]) -> usize {
        self.get_or_create_with(signature, |a| {
            for info in infos {
                a.register_column(*info);
            }
        })
    }

    pub fn archetype(&self, idx: usize) -> &Archetype {
        &self.archetypes[idx]
    }

    pub fn archetype_mut(&mut self, idx: usize) -> &mut Archetype {
        &mut self.archetypes[idx]
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Record that `entity` now lives at `(archetype_id, row)`.
    pub fn set_location(&mut self, entity: EntityId, archetype_id: usize, row: usize) {
        self.sparse.insert(
            entity.id(),
            EntityLocation {
                archetype_id,
                archetype_row: row,
            },
        );
    }

    pub fn get(&self, entity: EntityId) -> Option<EntityLocation> {
        self.sparse.get(entity.id()).copied()
    }

    pub fn get_archetype(&self, entity: EntityId) -> Option<&Archetype> {
        let loc = self.get(entity)?;
        Some(&self.archetypes[loc.archetype_id])
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.sparse.contains(entity.id())
    }

    /// Remove `entity` from whichever archetype it currently occupies,
    /// keeping the sparse index consistent with the swap-remove the
    /// archetype performs internally.
    pub fn remove(&mut self, entity: EntityId) -> Option<EntityLocation> {
        let loc = self.sparse.remove(entity.id())?;
        if let Some(moved_entity) = self.archetypes[loc.archetype_id].swap_remove(loc.archetype_row) {
            self.set_location(moved_entity, loc.archetype_id, loc.archetype_row);
        }
        Some(loc)
    }

    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.index.clear();
        self.sparse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::component_info;

    #[test]
    fn sparse_index_tracks_swap_remove() {
        let mut store = ArchetypeStore::new();
        let infos = vec![component_info::<u32>()];
        let sig = crate::archetype::signature_of(smallvec::smallvec![infos[0].hash]);
        let idx = store.get_or_create(sig, &infos);

        let mut entities = Vec::new();
        for i in 0..4u32 {
            let e = EntityId::new(i, 0);
            let row = store.archetype_mut(idx).append_row(e).unwrap();
            unsafe {
                (store.archetype_mut(idx).column_ptr_mut(infos[0].hash, row) as *mut u32).write(i);
            }
            store.set_location(e, idx, row);
            entities.push(e);
        }

        store.remove(entities[1]);
        assert!(!store.contains(entities[1]));
        // entity 3 was swapped into row 1
        let loc = store.get(entities[3]).unwrap();
        assert_eq!(loc.archetype_row, 1);
        assert_eq!(*store.archetype(idx).get::<u32>(1).unwrap(), 3);
    }
}
