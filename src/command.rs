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

//! Deferred mutation buffer.
//!
//! `Commands` lets a system queue up spawns, despawns, and component edits
//! without taking `&mut Manager` itself, recording closures that replay
//! against the `Manager` once the system has returned (see
//! [`crate::system::SystemParam::apply`] for `&mut Commands`). This crate's
//! systems run cooperatively on one thread — see the Non-goals this is
//! built against — so the queue holds plain `FnOnce`, with no `Send` bound.

use std::cell::Cell;
use std::rc::Rc;

use crate::component::{Bundle, Component};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::manager::Manager;
use crate::relations::RelationKind;

/// A handle to an entity that may not have been spawned yet. Cloning shares
/// the same cell, so every clone observes the id once [`Commands::flush`]
/// actually creates it.
#[derive(Clone)]
pub struct PendingEntity(Rc<Cell<Option<EntityId>>>);

impl PendingEntity {
    /// The entity id, once the spawn that produces it has been flushed.
    pub fn entity(&self) -> Option<EntityId> {
        self.0.get()
    }
}

type Mutation = Box<dyn FnOnce(&mut Manager) -> Result<()>>;

/// Queued world mutations, replayed in order by [`Commands::flush`].
#[derive(Default)]
pub struct Commands {
    queue: Vec<Mutation>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Queue an arbitrary mutation.
    pub fn add(&mut self, f: impl FnOnce(&mut Manager) -> Result<()> + 'static) {
        self.queue.push(Box::new(f));
    }

    /// Queue a spawn. The returned [`EntityCommands`] can chain further
    /// component inserts onto the not-yet-created entity.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EntityCommands<'_> {
        let pending = PendingEntity(Rc::new(Cell::new(None)));
        let slot = pending.clone();
        self.add(move |manager: &mut Manager| {
            let entity = manager.spawn(bundle)?;
            slot.0.set(Some(entity));
            Ok(())
        });
        EntityCommands {
            commands: self,
            pending,
        }
    }

    /// Queue further edits against an already-live `entity`.
    pub fn entity(&mut self, entity: EntityId) -> EntityCommands<'_> {
        EntityCommands {
            commands: self,
            pending: PendingEntity(Rc::new(Cell::new(Some(entity)))),
        }
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.add(move |manager: &mut Manager| manager.despawn(entity));
    }

    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) {
        self.add(move |manager: &mut Manager| manager.add_component(entity, value));
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.add(move |manager: &mut Manager| manager.remove_component::<T>(entity));
    }

    /// Queue inserting resource `value`, failing at flush time if one of
    /// type `T` already exists.
    pub fn add_resource<T: 'static>(&mut self, value: T) {
        self.add(move |manager: &mut Manager| manager.resources_mut().add_resource(value).map(|_| ()));
    }

    /// Queue removing the resource of type `T`, if present.
    pub fn remove_resource<T: 'static>(&mut self) {
        self.add(move |manager: &mut Manager| {
            manager.resources_mut().remove_resource::<T>();
            Ok(())
        });
    }

    /// Queue adding a `source -> target` relation edge of kind `K` with `data`.
    pub fn add_relation<K: RelationKind>(&mut self, source: EntityId, target: EntityId, data: K) {
        self.add(move |manager: &mut Manager| manager.add_relation::<K>(source, target, data));
    }

    /// Queue removing the `source -> target` relation edge of kind `K`, if present.
    pub fn remove_relation<K: RelationKind>(&mut self, source: EntityId, target: EntityId) {
        self.add(move |manager: &mut Manager| manager.remove_relation::<K>(source, target));
    }

    /// Replay every queued mutation against `manager`, in order, clearing
    /// the queue. A failing mutation does not cancel the rest — every error
    /// is collected and returned so the caller can decide how to react.
    pub fn flush(&mut self, manager: &mut Manager) -> Vec<EcsError> {
        let mut errors = Vec::new();
        for mutation in self.queue.drain(..) {
            if let Err(e) = mutation(manager) {
                errors.push(e);
            }
        }
        errors
    }
}

/// Chainable edits against one entity, possibly still pending creation.
pub struct EntityCommands<'a> {
    commands: &'a mut Commands,
    pending: PendingEntity,
}

impl<'a> EntityCommands<'a> {
    pub fn id(&self) -> PendingEntity {
        self.pending.clone()
    }

    pub fn insert<T: Component>(&mut self, value: T) -> &mut Self {
        let pending = self.pending.clone();
        self.commands.add(move |manager: &mut Manager| {
            let entity = pending
                .entity()
                .ok_or_else(|| EcsError::CommandError("entity not yet spawned".to_string()))?;
            manager.add_component(entity, value)
        });
        self
    }

    pub fn remove<T: Component>(&mut self) -> &mut Self {
        let pending = self.pending.clone();
        self.commands.add(move |manager: &mut Manager| {
            let entity = pending
                .entity()
                .ok_or_else(|| EcsError::CommandError("entity not yet spawned".to_string()))?;
            manager.remove_component::<T>(entity)
        });
        self
    }

    pub fn despawn(&mut self) {
        let pending = self.pending.clone();
        self.commands.add(move |manager: &mut Manager| {
            let entity = pending
                .entity()
                .ok_or_else(|| EcsError::CommandError("entity not yet spawned".to_string()))?;
            manager.despawn(entity)
        });
    }
}
