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

//! Typed directed edges between entities.
//!
//! A relation kind `K` (a marker/data type implementing [`RelationKind`])
//! attaches a [`Relation<K>`] component to the *source* entity, holding one
//! edge per target (or at most one, if `K::EXCLUSIVE`). A reverse index
//! (target → sources) is built lazily, and only for kinds that opt into it
//! via `K::INDEXED` — most relations are only ever walked source → target,
//! and paying for a reverse map nobody reads would be wasted memory.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::Result;
use crate::reflect::{type_hash, TypeHash};
use crate::world::World;

/// Compile-time configuration for a relation kind.
///
/// `K` doubles as the edge's payload type, so a relation with no data
/// attached is typically a zero-sized marker (e.g. `struct ChildOf;`).
pub trait RelationKind: Component {
    /// Maintain a target → sources reverse index, enabling
    /// [`RelationManager::get_children`]. Off by default.
    const INDEXED: bool = false;
    /// A source may only hold one outgoing edge of this kind at a time;
    /// adding a new one replaces the old. Off by default.
    const EXCLUSIVE: bool = false;
}

struct RelationEdge<K> {
    target: EntityId,
    data: K,
}

/// The component actually stored on the source entity: one edge, or several,
/// of relation kind `K`.
pub struct Relation<K: RelationKind> {
    edges: SmallVec<[RelationEdge<K>; 1]>,
}

impl<K: RelationKind> Relation<K> {
    fn empty() -> Self {
        Self { edges: SmallVec::new() }
    }
}

type ReverseIndex = FxHashMap<EntityId, Vec<EntityId>>;

/// Owns the reverse (target → sources) indices for every relation kind that
/// has opted in, plus the type-erased cleanup glue [`RelationManager::remove_entity`]
/// needs to strip relation components without knowing their concrete `K`.
#[derive(Default)]
pub struct RelationManager {
    reverse: FxHashMap<TypeHash, ReverseIndex>,
    // Drops the K-specific edge pointing at `target` from `source`'s Relation<K>,
    // removing the component entirely if that was its last edge.
    remove_edge_erased: FxHashMap<TypeHash, Box<dyn Fn(&mut World, EntityId, EntityId)>>,
    // Reads `source`'s Relation<K> (if any), strips its reverse-index entries,
    // then removes the component. Used when `source` itself is despawned.
    strip_as_source: FxHashMap<TypeHash, Box<dyn Fn(&mut World, &mut ReverseIndex, EntityId)>>,
}

impl RelationManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_registered<K: RelationKind>(&mut self) {
        let hash = type_hash::<K>();
        self.remove_edge_erased.entry(hash).or_insert_with(|| {
            Box::new(|world: &mut World, source: EntityId, target: EntityId| {
                let mut now_empty = false;
                if let Some(rel) = world.get_component_mut::<Relation<K>>(source) {
                    rel.edges.retain(|e| e.target != target);
                    now_empty = rel.edges.is_empty();
                }
                if now_empty {
                    let _ = world.remove_component::<Relation<K>>(source);
                }
            })
        });
        self.strip_as_source.entry(hash).or_insert_with(|| {
            Box::new(|world: &mut World, reverse: &mut ReverseIndex, source: EntityId| {
                if K::INDEXED {
                    if let Some(rel) = world.get_component::<Relation<K>>(source) {
                        for edge in &rel.edges {
                            if let Some(sources) = reverse.get_mut(&edge.target) {
                                sources.retain(|&s| s != source);
                            }
                        }
                    }
                }
                let _ = world.remove_component::<Relation<K>>(source);
            })
        });
        if K::INDEXED {
            self.reverse.entry(hash).or_default();
        }
    }

    fn reverse_insert<K: RelationKind>(&mut self, target: EntityId, source: EntityId) {
        let sources = self.reverse.entry(type_hash::<K>()).or_default().entry(target).or_default();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    fn reverse_remove<K: RelationKind>(&mut self, target: EntityId, source: EntityId) {
        if let Some(map) = self.reverse.get_mut(&type_hash::<K>()) {
            if let Some(sources) = map.get_mut(&target) {
                sources.retain(|&s| s != source);
            }
        }
    }

    /// Add an edge `source -> target` carrying `data`. For `K::EXCLUSIVE`
    /// kinds this replaces any existing outgoing edge of this kind.
    pub fn add_with_data<K: RelationKind>(
        &mut self,
        world: &mut World,
        source: EntityId,
        target: EntityId,
        data: K,
    ) -> Result<()> {
        self.ensure_registered::<K>();

        let mut replaced_target = None;
        if let Some(existing) = world.get_component_mut::<Relation<K>>(source) {
            if K::EXCLUSIVE {
                replaced_target = existing.edges.first().map(|e| e.target);
                existing.edges.clear();
            }
            existing.edges.push(RelationEdge { target, data });
        } else {
            let mut rel = Relation::<K>::empty();
            rel.edges.push(RelationEdge { target, data });
            world.add(source, (rel,))?;
        }

        if K::INDEXED {
            if let Some(old_target) = replaced_target {
                self.reverse_remove::<K>(old_target, source);
            }
            self.reverse_insert::<K>(target, source);
        }
        Ok(())
    }

    /// Add an edge with `K`'s `Default` value as payload.
    pub fn add<K: RelationKind + Default>(
        &mut self,
        world: &mut World,
        source: EntityId,
        target: EntityId,
    ) -> Result<()> {
        self.add_with_data::<K>(world, source, target, K::default())
    }

    /// Remove the `source -> target` edge of kind `K`, if present.
    pub fn remove<K: RelationKind>(&mut self, world: &mut World, source: EntityId, target: EntityId) -> Result<()> {
        self.ensure_registered::<K>();
        if let Some(rel) = world.get_component_mut::<Relation<K>>(source) {
            rel.edges.retain(|e| e.target != target);
            if rel.edges.is_empty() {
                world.remove_component::<Relation<K>>(source)?;
            }
        }
        if K::INDEXED {
            self.reverse_remove::<K>(target, source);
        }
        Ok(())
    }

    /// Strip every relation `entity` participates in, as either source or
    /// target. Does not despawn `entity` itself — call
    /// [`crate::manager::Manager::despawn`] for that.
    pub fn remove_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        for (hash, reverse) in self.reverse.iter_mut() {
            if let Some(sources) = reverse.remove(&entity) {
                if let Some(cleanup) = self.remove_edge_erased.get(hash) {
                    for source in sources {
                        cleanup(world, source, entity);
                    }
                }
            }
        }

        if let Some(components) = world.get_all_components(entity) {
            for component in components {
                if let Some(strip) = self.strip_as_source.get(&component.hash) {
                    let reverse = self.reverse.entry(component.hash).or_default();
                    strip(world, reverse, entity);
                }
            }
        }
        Ok(())
    }

    /// The first (or only, for `EXCLUSIVE` kinds) outgoing target of `source`.
    pub fn get_parent<K: RelationKind>(&self, world: &World, source: EntityId) -> Option<EntityId> {
        world.get_component::<Relation<K>>(source)?.edges.first().map(|e| e.target)
    }

    /// Every outgoing target of `source` for relation kind `K`.
    pub fn get_parents<K: RelationKind>(&self, world: &World, source: EntityId) -> Vec<EntityId> {
        world
            .get_component::<Relation<K>>(source)
            .map(|rel| rel.edges.iter().map(|e| e.target).collect())
            .unwrap_or_default()
    }

    /// Sources with an outgoing `K` edge to `target`. Empty if `K` is not
    /// `INDEXED` — there is no index to answer from.
    pub fn get_children<K: RelationKind>(&self, target: EntityId) -> Vec<EntityId> {
        self.reverse
            .get(&type_hash::<K>())
            .and_then(|m| m.get(&target))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has<K: RelationKind>(&self, world: &World, source: EntityId, target: EntityId) -> bool {
        world
            .get_component::<Relation<K>>(source)
            .map(|rel| rel.edges.iter().any(|e| e.target == target))
            .unwrap_or(false)
    }

    /// Number of relation kinds with an active reverse index.
    pub fn index_count(&self) -> usize {
        self.reverse.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Bundle;

    #[derive(Default)]
    struct ChildOf;
    impl RelationKind for ChildOf {
        const INDEXED: bool = true;
        const EXCLUSIVE: bool = true;
    }

    struct Likes;
    impl RelationKind for Likes {
        const INDEXED: bool = false;
        const EXCLUSIVE: bool = false;
    }

    struct Marker(u8);

    fn spawn(world: &mut World, id: u32) -> EntityId {
        let e = EntityId::new(id, 0);
        world.add(e, (Marker(0),)).unwrap();
        e
    }

    #[test]
    fn exclusive_relation_reassignment_updates_reverse_index() {
        let mut world = World::new();
        let mut relations = RelationManager::new();
        let parent = spawn(&mut world, 0);
        let child_a = spawn(&mut world, 1);
        let child_b = spawn(&mut world, 2);

        relations.add::<ChildOf>(&mut world, child_a, parent).unwrap();
        relations.add::<ChildOf>(&mut world, child_b, parent).unwrap();

        let mut kids = relations.get_children::<ChildOf>(parent);
        kids.sort();
        assert_eq!(kids, vec![child_a, child_b]);
        assert_eq!(relations.get_parent::<ChildOf>(&world, child_a), Some(parent));

        let other_parent = spawn(&mut world, 3);
        relations.add::<ChildOf>(&mut world, child_a, other_parent).unwrap();
        assert_eq!(relations.get_parent::<ChildOf>(&world, child_a), Some(other_parent));
        assert_eq!(relations.get_children::<ChildOf>(parent), vec![child_b]);
    }

    #[test]
    fn non_indexed_relation_allows_multiple_targets() {
        let mut world = World::new();
        let mut relations = RelationManager::new();
        let alice = spawn(&mut world, 0);
        let cats = spawn(&mut world, 1);
        let dogs = spawn(&mut world, 2);

        relations.add::<Likes>(&mut world, alice, cats).unwrap();
        relations.add::<Likes>(&mut world, alice, dogs).unwrap();

        let mut targets = relations.get_parents::<Likes>(&world, alice);
        targets.sort();
        assert_eq!(targets, vec![cats, dogs]);
        assert!(relations.get_children::<Likes>(cats).is_empty());
    }

    #[test]
    fn remove_entity_strips_both_directions() {
        let mut world = World::new();
        let mut relations = RelationManager::new();
        let parent = spawn(&mut world, 0);
        let child = spawn(&mut world, 1);
        relations.add::<ChildOf>(&mut world, child, parent).unwrap();

        relations.remove_entity(&mut world, child).unwrap();
        assert!(relations.get_children::<ChildOf>(parent).is_empty());
        assert!(!world.has_component::<Relation<ChildOf>>(child));
    }
}
