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

//! The central facade: entity id lifecycle, world state, resources,
//! relations, cached systems, and `Local<T>` scratch storage, all reached
//! through one `&mut Manager`.
//!
//! `Manager` is the thing a host application owns; `World`, `ResourceTable`,
//! and `RelationManager` are the layers it composes. A [`crate::schedule::Scheduler`]
//! and a [`crate::plugin::PluginManager`] are separate objects the host drives
//! alongside it — both take `&mut Manager` rather than owning one, so a host
//! embedding this crate inside its own app loop is free to hold the pieces
//! however it likes.

use rustc_hash::FxHashMap;

use crate::component::{Bundle, Component};
use crate::entity::{EntityAllocator, EntityId};
use crate::error::Result;
use crate::event::EventStore;
use crate::reflect::{type_hash, TypeHash};
use crate::relations::RelationManager;
use crate::resource::ResourceTable;
use crate::system::ErasedSystem;
use crate::world::World;

/// One `(entity, type_hash)` pair recorded on the `component_added`/
/// `component_removed` streams every time a component is attached to or
/// detached from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentEvent {
    pub entity: EntityId,
    pub type_hash: TypeHash,
}

/// Opaque handle into [`Manager`]'s system cache. Stable for the lifetime of
/// the `Manager` it was produced from; looking one up after the `Manager` has
/// been dropped and rebuilt is a logic error, not something this type
/// prevents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemHandle(pub(crate) u64);

pub struct Manager {
    allocator: EntityAllocator,
    world: World,
    resources: ResourceTable,
    relations: RelationManager,
    systems: FxHashMap<u64, Box<dyn ErasedSystem>>,
    locals: FxHashMap<(u64, TypeHash), Box<dyn std::any::Any>>,
    component_added: EventStore<ComponentEvent>,
    component_removed: EventStore<ComponentEvent>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            world: World::new(),
            resources: ResourceTable::new(),
            relations: RelationManager::new(),
            systems: FxHashMap::default(),
            locals: FxHashMap::default(),
            component_added: EventStore::new(),
            component_removed: EventStore::new(),
        }
    }

    // --- entity lifecycle -------------------------------------------------

    /// Allocate a fresh entity id and attach `bundle` to it.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<EntityId> {
        let entity = self.allocator.allocate();
        let hashes = B::sorted_type_hashes();
        self.world.add(entity, bundle)?;
        for hash in hashes {
            self.component_added.push(ComponentEvent { entity, type_hash: hash });
        }
        Ok(entity)
    }

    /// Attach (or overwrite, on migration) `value` on `entity`, recording a
    /// `component_added` event the first time `T` appears on it.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> Result<()> {
        let was_present = self.world.has_component::<T>(entity);
        self.world.add(entity, (value,))?;
        if !was_present {
            self.component_added.push(ComponentEvent {
                entity,
                type_hash: type_hash::<T>(),
            });
        }
        Ok(())
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let was_present = self.world.has_component::<T>(entity);
        self.world.remove_component::<T>(entity)?;
        if was_present {
            self.component_removed.push(ComponentEvent {
                entity,
                type_hash: type_hash::<T>(),
            });
        }
        Ok(())
    }

    /// Add an edge `source -> target` of relation kind `K` carrying `data`.
    /// See [`RelationManager::add_with_data`].
    pub fn add_relation<K: crate::relations::RelationKind>(
        &mut self,
        source: EntityId,
        target: EntityId,
        data: K,
    ) -> Result<()> {
        self.relations.add_with_data(&mut self.world, source, target, data)
    }

    /// Remove the `source -> target` edge of relation kind `K`, if present.
    pub fn remove_relation<K: crate::relations::RelationKind>(
        &mut self,
        source: EntityId,
        target: EntityId,
    ) -> Result<()> {
        self.relations.remove::<K>(&mut self.world, source, target)
    }

    /// Despawn `entity`: records `component_removed` for everything it was
    /// carrying, strips its relations, frees its storage row, and recycles
    /// its id (bumping the generation on next reuse).
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        if let Some(components) = self.world.get_all_components(entity) {
            for component in components {
                self.component_removed.push(ComponentEvent {
                    entity,
                    type_hash: component.hash,
                });
            }
        }
        self.relations.remove_entity(&mut self.world, entity)?;
        self.world.despawn(entity)?;
        self.allocator.free(entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn live_entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    // --- layer access -------------------------------------------------------

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }

    pub fn relations(&self) -> &RelationManager {
        &self.relations
    }

    pub fn relations_mut(&mut self) -> &mut RelationManager {
        &mut self.relations
    }

    pub fn component_added_mut(&mut self) -> &mut EventStore<ComponentEvent> {
        &mut self.component_added
    }

    pub fn component_removed_mut(&mut self) -> &mut EventStore<ComponentEvent> {
        &mut self.component_removed
    }

    // --- Local<T> scratch storage -------------------------------------------

    /// The per-`(system, T)` scratch slot backing the `Local<T>` system
    /// parameter, created with `T::default()` on first use and kept across
    /// subsequent runs of the same system.
    pub fn local_slot<T: Default + 'static>(&mut self, system_hash: u64) -> &mut T {
        let key = (system_hash, type_hash::<T>());
        self.locals
            .entry(key)
            .or_insert_with(|| Box::new(T::default()) as Box<dyn std::any::Any>)
            .downcast_mut::<T>()
            .expect("key encodes both the system and the type, so the stored box always matches")
    }

    // --- system cache --------------------------------------------------------

    /// Insert `system` under `hash` unless one is already cached there
    /// (idempotent re-registration of the same function+param-set pair).
    pub(crate) fn register_system(&mut self, hash: u64, system: Box<dyn ErasedSystem>) -> SystemHandle {
        self.systems.entry(hash).or_insert(system);
        SystemHandle(hash)
    }

    pub fn has_system(&self, handle: SystemHandle) -> bool {
        self.systems.contains_key(&handle.0)
    }

    /// Run the cached system behind `handle`. The system is temporarily
    /// removed from the cache for the duration of the call so that it (or
    /// anything it resolves) can take `&mut Manager` without a borrow
    /// conflict against its own storage slot.
    pub fn run_system(&mut self, handle: SystemHandle) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = tracing::trace_span!("system", handle = handle.0).entered();

        let mut system = self
            .systems
            .remove(&handle.0)
            .ok_or(crate::error::EcsError::InvalidSystemHandle)?;
        let result = system.run(self);
        self.systems.insert(handle.0, system);
        result
    }
}
