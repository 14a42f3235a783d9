//! Encoding a small entity graph to bytes and decoding it back, through the
//! public wire-format API plus the debug world inspector.

use archetype_manager::component::Component;
use archetype_manager::debug::WorldInspector;
use archetype_manager::entity::EntityId;
use archetype_manager::manager::Manager;
use archetype_manager::serialization::{build_entity_instance, write_component_stream, EntityInstance};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tag(u32);
impl Component for Tag {}

#[test]
fn component_stream_for_a_live_entity_round_trips() {
    let mut manager = Manager::new();
    let e = manager.spawn((Position { x: 3.0, y: 4.0 }, Tag(7))).unwrap();

    let bytes = write_component_stream(manager.world(), e).unwrap();
    let decoded = archetype_manager::serialization::read_component_stream(&bytes).unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn entity_instance_follows_explicit_child_resolver() {
    let mut manager = Manager::new();
    let parent = manager.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();
    let child = manager.spawn((Position { x: 1.0, y: 1.0 }, Tag(1))).unwrap();

    let resolve = |e: EntityId| if e == parent { vec![child] } else { Vec::new() };
    let instance = build_entity_instance(manager.world(), parent, &resolve).unwrap();

    assert_eq!(instance.components.len(), 1);
    assert_eq!(instance.refs.len(), 1);
    assert_eq!(instance.refs[0].components.len(), 2);

    let mut bytes = Vec::new();
    instance.write(&mut bytes);
    let decoded = EntityInstance::read(&bytes).unwrap();
    assert_eq!(decoded.refs.len(), 1);
    assert_eq!(decoded.refs[0].components.len(), 2);
}

#[test]
fn world_inspector_snapshot_reports_every_archetype() {
    let mut manager = Manager::new();
    manager.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();
    manager.spawn((Position { x: 1.0, y: 1.0 }, Tag(2))).unwrap();
    manager.spawn((Position { x: 2.0, y: 2.0 }, Tag(3))).unwrap();

    let snapshot = WorldInspector::snapshot(manager.world());
    assert_eq!(snapshot.entity_count, 3);
    assert_eq!(snapshot.archetype_count, 2);

    let json = WorldInspector::snapshot_json(manager.world()).unwrap();
    assert!(json.contains("entity_count"));
}
