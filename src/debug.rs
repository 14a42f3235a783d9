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

//! World inspection for tooling: a read-only snapshot of archetype layout
//! and entity counts, with an optional JSON dump via `serde`. This module
//! never prints — callers decide where the snapshot goes.

use serde::Serialize;

use crate::reflect::TypeHash;
use crate::world::World;

/// One archetype's shape and occupancy at the moment of inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ArchetypeInfo {
    pub id: usize,
    pub component_hashes: Vec<TypeHash>,
    pub entity_count: usize,
}

/// A point-in-time snapshot of a [`World`]'s archetype store.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub entity_count: usize,
    pub archetype_count: usize,
    pub archetypes: Vec<ArchetypeInfo>,
}

/// Read-only inspector over a [`World`]. Builds [`WorldSnapshot`]s on
/// demand; holds no state of its own.
pub struct WorldInspector;

impl WorldInspector {
    /// Total live entities across every archetype.
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    /// Number of distinct archetypes currently allocated.
    pub fn archetype_count(world: &World) -> usize {
        world.store().archetype_count()
    }

    /// Per-archetype component layout and occupancy.
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        world
            .store()
            .archetypes()
            .iter()
            .enumerate()
            .map(|(id, archetype)| ArchetypeInfo {
                id,
                component_hashes: archetype.signature().to_vec(),
                entity_count: archetype.len(),
            })
            .collect()
    }

    /// Full snapshot: entity count, archetype count, and per-archetype summary.
    pub fn snapshot(world: &World) -> WorldSnapshot {
        WorldSnapshot {
            entity_count: Self::entity_count(world),
            archetype_count: Self::archetype_count(world),
            archetypes: Self::archetype_summary(world),
        }
    }

    /// [`WorldSnapshot`] rendered as a JSON string, for tooling that wants a
    /// wire-friendly dump rather than the structured value.
    pub fn snapshot_json(world: &World) -> serde_json::Result<String> {
        serde_json::to_string(&Self::snapshot(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    #[derive(Debug, Clone, Copy)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[test]
    fn snapshot_reports_entity_and_archetype_counts() {
        let mut world = World::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        world.add(a, (Position { x: 0.0, y: 0.0 },)).unwrap();
        world
            .add(b, (Position { x: 1.0, y: 1.0 }, Velocity { dx: 0.0, dy: 0.0 }))
            .unwrap();

        let snapshot = WorldInspector::snapshot(&world);
        assert_eq!(snapshot.entity_count, 2);
        assert_eq!(snapshot.archetype_count, 2);
        assert_eq!(
            snapshot.archetypes.iter().map(|a| a.entity_count).sum::<usize>(),
            2
        );
    }

    #[test]
    fn snapshot_json_round_trips_through_serde_json() {
        let mut world = World::new();
        let e = EntityId::new(0, 0);
        world.add(e, (Position { x: 0.0, y: 0.0 },)).unwrap();

        let json = WorldInspector::snapshot_json(&world).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entity_count"], 1);
    }
}
