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

//! Archetype storage: one contiguous column per component type, plus the
//! packed entity row table. An archetype only knows about its own data; it has
//! no notion of other archetypes or of the store that owns it.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::reflect::{component_info, type_hash, ComponentInfo, TypeHash};

/// The sorted, deduplicated sequence of component type hashes identifying an
/// archetype. Component order within a signature is otherwise opaque.
pub type ArchetypeSignature = SmallVec<[TypeHash; 8]>;

/// Build a signature from an arbitrary list of hashes, asserting the
/// ascending-sortedness invariant archetypes rely on.
pub fn signature_of(mut hashes: SmallVec<[TypeHash; 8]>) -> ArchetypeSignature {
    hashes.sort_unstable();
    hashes.dedup();
    hashes
}

/// Archetype: Structure of Arrays storage for one fixed component signature.
pub struct Archetype {
    signature: ArchetypeSignature,
    entities: Vec<EntityId>,
    components: Vec<ComponentColumn>,
    component_indices: FxHashMap<TypeHash, usize>,
}

impl Archetype {
    /// Create a new, empty archetype for `signature`. Columns are registered
    /// lazily via [`Archetype::register_component`].
    pub fn new(signature: ArchetypeSignature) -> Self {
        debug_assert!(
            signature.windows(2).all(|w| w[0] < w[1]),
            "archetype signature must be strictly ascending"
        );
        Self {
            signature,
            entities: Vec::new(),
            components: Vec::new(),
            component_indices: FxHashMap::default(),
        }
    }

    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has_column(&self, hash: TypeHash) -> bool {
        self.component_indices.contains_key(&hash)
    }

    pub fn column_index(&self, hash: TypeHash) -> Option<usize> {
        self.component_indices.get(&hash).copied()
    }

    pub fn get_column(&self, hash: TypeHash) -> Option<&ComponentColumn> {
        let idx = *self.component_indices.get(&hash)?;
        self.components.get(idx)
    }

    pub fn get_column_mut(&mut self, hash: TypeHash) -> Option<&mut ComponentColumn> {
        let idx = *self.component_indices.get(&hash)?;
        self.components.get_mut(idx)
    }

    pub fn get_column_by_index(&self, index: usize) -> Option<&ComponentColumn> {
        self.components.get(index)
    }

    /// Snapshot of every column's layout, for copying a row into a
    /// differently-shaped archetype during migration.
    pub fn column_infos(&self) -> Vec<ComponentInfo> {
        self.components.iter().map(|c| c.info()).collect()
    }

    pub fn get_column_mut_by_index(&mut self, index: usize) -> Option<&mut ComponentColumn> {
        self.components.get_mut(index)
    }

    /// Register the column for `T` if not already present. Called once per
    /// archetype per component type that appears in its signature.
    pub fn register_component<T: Component>(&mut self) {
        self.register_column(component_info::<T>());
    }

    pub(crate) fn register_column(&mut self, info: ComponentInfo) {
        if !self.component_indices.contains_key(&info.hash) {
            let idx = self.components.len();
            self.components.push(ComponentColumn::new(info));
            self.component_indices.insert(info.hash, idx);
        }
    }

    /// Raw pointer to row `row`'s storage for component `hash`. Extends the
    /// column if `row` is one past its current length (the append path); any
    /// further gap is a caller bug.
    ///
    /// # Safety
    /// The caller must write a fully-initialized value of the correct type to
    /// the returned pointer before it is read back.
    pub unsafe fn column_ptr_mut(&self, hash: TypeHash, row: usize) -> *mut u8 {
        let idx = self.component_indices[&hash];
        // SAFETY: columns are only ever grown through `append_row`, which
        // reserves storage for `row` up front; this cast away from `&self`
        // matches that single-writer-per-row discipline.
        let column = &self.components[idx] as *const ComponentColumn as *mut ComponentColumn;
        unsafe { (*column).ptr_mut(row) }
    }

    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.get_column(type_hash::<T>())?.get::<T>(row)
    }

    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        let hash = type_hash::<T>();
        self.get_column_mut(hash)?.get_mut::<T>(row)
    }

    /// Append a new row for `entity`, reserving storage in every column. The
    /// caller must then write every column's data for this row (typically via
    /// [`Archetype::column_ptr_mut`]) before the row is observable through a
    /// query.
    pub fn append_row(&mut self, entity: EntityId) -> Result<usize> {
        let row = self.entities.len();
        self.entities.push(entity);
        for column in &mut self.components {
            column.grow_to(row + 1).map_err(|_| EcsError::OutOfMemory)?;
        }
        Ok(row)
    }

    /// Reserve storage for `additional` more rows without allocating them yet.
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.components {
            column.reserve(additional);
        }
    }

    /// Swap-remove `row`: drops that row's component values, moves the last
    /// row's entity and bytes into its place (if it wasn't already last), and
    /// shrinks by one. Returns the entity that was moved into `row`, if any.
    pub fn swap_remove(&mut self, row: usize) -> Option<EntityId> {
        if row >= self.entities.len() {
            return None;
        }
        for column in &mut self.components {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }
}

/// Type-erased component column: a byte buffer plus the per-element layout
/// needed to treat it as a typed array.
pub struct ComponentColumn {
    data: Vec<u8>,
    info: ComponentInfo,
}

impl ComponentColumn {
    pub fn new(info: ComponentInfo) -> Self {
        Self {
            data: Vec::new(),
            info,
        }
    }

    pub fn item_size(&self) -> usize {
        self.info.size
    }

    pub fn info(&self) -> ComponentInfo {
        self.info
    }

    pub fn type_hash(&self) -> TypeHash {
        self.info.hash
    }

    fn grow_to(&mut self, rows: usize) -> std::result::Result<(), ()> {
        let needed = rows * self.info.size;
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }
        Ok(())
    }

    fn reserve(&mut self, additional_rows: usize) {
        self.data.reserve(additional_rows * self.info.size.max(1));
    }

    /// Pointer to row `index`'s bytes, growing the buffer if `index` is the
    /// next row to be appended.
    ///
    /// # Safety
    /// Caller must write a fully-initialized element before reading it back.
    pub unsafe fn ptr_mut(&mut self, index: usize) -> *mut u8 {
        let offset = index * self.info.size;
        if offset + self.info.size > self.data.len() {
            self.data.resize(offset + self.info.size, 0);
        }
        unsafe { self.data.as_mut_ptr().add(offset) }
    }

    pub fn get<T: Component>(&self, index: usize) -> Option<&T> {
        let offset = index * self.info.size;
        if offset + self.info.size > self.data.len() {
            return None;
        }
        Some(unsafe { &*(self.data.as_ptr().add(offset) as *const T) })
    }

    pub fn get_mut<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        let offset = index * self.info.size;
        if offset + self.info.size > self.data.len() {
            return None;
        }
        Some(unsafe { &mut *(self.data.as_mut_ptr().add(offset) as *mut T) })
    }

    /// Raw bytes for row `index`, bounds-checked.
    pub fn get_bytes(&self, index: usize) -> Option<&[u8]> {
        let offset = index * self.info.size;
        self.data.get(offset..offset + self.info.size)
    }

    pub fn get_bytes_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let offset = index * self.info.size;
        let end = offset + self.info.size;
        self.data.get_mut(offset..end)
    }

    pub fn len(&self) -> usize {
        if self.info.size == 0 {
            0
        } else {
            self.data.len() / self.info.size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the value at `row`, then move the last row's bytes into its place
    /// (unless it was already last), and shrink by one row.
    fn swap_remove(&mut self, row: usize) {
        let size = self.info.size;
        if size == 0 {
            return;
        }
        let len = self.len();
        if row >= len {
            return;
        }
        let row_off = row * size;
        if let Some(drop_fn) = self.info.drop_fn {
            unsafe {
                drop_fn(self.data.as_mut_ptr().add(row_off));
            }
        }
        let last = len - 1;
        if row != last {
            let last_off = last * size;
            self.data.copy_within(last_off..last_off + size, row_off);
        }
        self.data.truncate(last * size);
    }
}

impl Drop for ComponentColumn {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.info.drop_fn {
            let count = self.len();
            for i in 0..count {
                let offset = i * self.info.size;
                unsafe {
                    drop_fn(self.data.as_mut_ptr().add(offset));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_swap_remove_preserves_column_coherence() {
        let sig = signature_of(smallvec::smallvec![type_hash::<u32>()]);
        let mut arch = Archetype::new(sig);
        arch.register_component::<u32>();

        for i in 0..5u32 {
            let entity = EntityId::new(i, 0);
            let row = arch.append_row(entity).unwrap();
            unsafe {
                let ptr = arch.column_ptr_mut(type_hash::<u32>(), row) as *mut u32;
                ptr.write(i * 10);
            }
        }
        assert_eq!(arch.len(), 5);
        assert_eq!(arch.get_column(type_hash::<u32>()).unwrap().len(), 5);

        let swapped = arch.swap_remove(1);
        assert_eq!(swapped, Some(EntityId::new(4, 0)));
        assert_eq!(arch.len(), 4);
        assert_eq!(*arch.get::<u32>(1).unwrap(), 40);
    }

    #[test]
    fn swap_remove_last_row_just_shrinks() {
        let sig = signature_of(smallvec::smallvec![type_hash::<u8>()]);
        let mut arch = Archetype::new(sig);
        arch.register_component::<u8>();
        let row = arch.append_row(EntityId::new(0, 0)).unwrap();
        unsafe {
            arch.column_ptr_mut(type_hash::<u8>(), row).write(7);
        }
        let swapped = arch.swap_remove(0);
        assert_eq!(swapped, None);
        assert!(arch.is_empty());
    }
}
