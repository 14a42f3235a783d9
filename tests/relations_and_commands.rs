//! Hierarchy bookkeeping and deferred command replay, exercised the way a
//! host embedding the crate would: through `Manager` and `Commands` only.

use archetype_manager::command::Commands;
use archetype_manager::component::Component;
use archetype_manager::manager::Manager;
use archetype_manager::relations::RelationKind;

#[derive(Default, Clone, Copy)]
struct ChildOf;
impl Component for ChildOf {}
impl RelationKind for ChildOf {
    const INDEXED: bool = true;
    const EXCLUSIVE: bool = true;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[test]
fn despawning_a_parent_detaches_its_children() {
    let mut manager = Manager::new();
    let parent = manager.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();
    let child_a = manager.spawn((Position { x: 1.0, y: 0.0 },)).unwrap();
    let child_b = manager.spawn((Position { x: 2.0, y: 0.0 },)).unwrap();

    manager.add_relation::<ChildOf>(child_a, parent, ChildOf).unwrap();
    manager.add_relation::<ChildOf>(child_b, parent, ChildOf).unwrap();

    let mut children = manager.relations().get_children::<ChildOf>(parent);
    children.sort();
    let mut expected = vec![child_a, child_b];
    expected.sort();
    assert_eq!(children, expected);

    manager.despawn(parent).unwrap();

    assert!(manager.relations().get_children::<ChildOf>(parent).is_empty());
    assert!(manager.is_alive(child_a));
    assert!(manager.relations().get_parent::<ChildOf>(manager.world(), child_a).is_none());
}

#[test]
fn deferred_commands_spawn_insert_and_relate_in_one_flush() {
    let mut manager = Manager::new();
    let mut commands = Commands::new();

    let parent_handle = {
        let mut entity_commands = commands.spawn((Position { x: 0.0, y: 0.0 },));
        entity_commands.id()
    };
    let child_handle = {
        let mut entity_commands = commands.spawn((Position { x: 5.0, y: 5.0 },));
        entity_commands.id()
    };

    let (parent_for_closure, child_for_closure) = (parent_handle.clone(), child_handle.clone());
    commands.add(move |manager: &mut Manager| {
        let parent = parent_for_closure.entity().unwrap();
        let child = child_for_closure.entity().unwrap();
        manager.add_relation::<ChildOf>(child, parent, ChildOf)
    });

    let errors = commands.flush(&mut manager);
    assert!(errors.is_empty());

    let parent = parent_handle.entity().unwrap();
    let child = child_handle.entity().unwrap();
    assert_eq!(manager.relations().get_parent::<ChildOf>(manager.world(), child), Some(parent));
}
