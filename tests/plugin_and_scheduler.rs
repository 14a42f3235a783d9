//! A small "game" wired up the way a host application would: a plugin that
//! registers a resource, a movement system, and a damage-event pipeline,
//! driven through a full tick via the public crate API only.

use archetype_manager::manager::Manager;
use archetype_manager::plugin::{Plugin, PluginManager};
use archetype_manager::query::Query;
use archetype_manager::schedule::{priority, Scheduler};
use archetype_manager::system::{EventReader, ResMut};
use archetype_manager::{EcsError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

struct DamageDealt(u32);

struct TotalDamage(u32);

struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&mut self, manager: &mut Manager, scheduler: &mut Scheduler) -> Result<()> {
        manager.resources_mut().add_resource(TotalDamage(0))?;
        scheduler.register_event::<DamageDealt>(manager);

        fn apply_velocity(q: Query<'static, (&mut Position, &Velocity)>) {
            for (pos, vel) in q {
                pos.x += vel.dx;
                pos.y += vel.dy;
            }
        }
        let move_handle = manager.add_system(apply_velocity);
        scheduler.add_system(priority::UPDATE, move_handle)?;

        fn accumulate_damage(mut reader: EventReader<DamageDealt>, mut total: ResMut<TotalDamage>) {
            let mut iter = reader.iter();
            while let Some(event) = iter.next() {
                total.0 += event.0;
                iter.mark_handled();
            }
        }
        let damage_handle = manager.add_system(accumulate_damage);
        scheduler.add_system(priority::POST_UPDATE, damage_handle)?;
        Ok(())
    }
}

#[test]
fn one_tick_moves_entities_and_drains_damage_events() {
    let mut manager = Manager::new();
    let mut scheduler = Scheduler::new();
    let mut plugins = PluginManager::new();
    plugins.add(MovementPlugin).unwrap();
    plugins.build(&mut manager, &mut scheduler).unwrap();

    let e = manager
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }))
        .unwrap();

    manager
        .resources_mut()
        .get_resource_mut::<archetype_manager::EventStore<DamageDealt>>()
        .unwrap()
        .push(DamageDealt(5));
    manager
        .resources_mut()
        .get_resource_mut::<archetype_manager::EventStore<DamageDealt>>()
        .unwrap()
        .push(DamageDealt(10));

    scheduler.run_stages(&mut manager, priority::FIRST, priority::POST_UPDATE).unwrap();

    assert_eq!(manager.world().get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
    assert_eq!(manager.resources().get_resource::<TotalDamage>().unwrap().0, 15);

    // Last-stage cleanup (registered by register_event) discards the handled events.
    scheduler.run_stage(&mut manager, priority::LAST).unwrap();
    assert_eq!(
        manager
            .resources()
            .get_resource::<archetype_manager::EventStore<DamageDealt>>()
            .unwrap()
            .count(),
        0
    );
}

#[test]
fn duplicate_plugin_registration_is_rejected() {
    let mut plugins = PluginManager::new();
    plugins.add(MovementPlugin).unwrap();
    assert!(matches!(plugins.add(MovementPlugin), Err(EcsError::PluginAlreadyExists)));
}
