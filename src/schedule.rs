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

//! Priority-ordered stages of systems, plus a state-machine subsystem.
//!
//! Stages are identified by an `i64` priority rather than a name; built-in
//! stages sit at widely gap-spaced points so a host can always carve out
//! room for a custom stage between two of them. A registered state enum
//! gets its `OnEnter`/`OnExit` stage priorities derived deterministically by
//! hashing `(type, variant)` into a reserved band — see [`on_enter`],
//! [`on_exit`], [`in_state`].

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::{EcsError, Result};
use crate::event::EventStore;
use crate::manager::{Manager, SystemHandle};
use crate::reflect::type_hash;
use crate::system::{ErasedSystem, StateManager};

/// Built-in stage priorities. Large gaps between consecutive values leave
/// room for custom stages; everything from [`CUSTOM_MIN`] up is reserved
/// for hash-derived or explicit custom priorities.
pub mod priority {
    pub const MIN: i64 = 0;
    pub const STARTUP: i64 = 1_000;
    pub const FIRST: i64 = 100_000;
    pub const PRE_UPDATE: i64 = 200_000;
    pub const UPDATE: i64 = 300_000;
    pub const POST_UPDATE: i64 = 400_000;
    pub const PRE_DRAW: i64 = 500_000;
    pub const DRAW: i64 = 600_000;
    pub const POST_DRAW: i64 = 700_000;
    pub const STATE_TRANSITION: i64 = 1_000_000;
    pub const STATE_ON_EXIT: i64 = 1_100_000;
    pub const STATE_ON_ENTER: i64 = 1_200_000;
    pub const STATE_UPDATE: i64 = 1_300_000;
    pub const LAST: i64 = i64::MAX - 1;
    pub const EXIT: i64 = i64::MAX;
    /// Start of the range custom stages (explicit or hash-derived) live in.
    pub const CUSTOM_MIN: i64 = 2_000_000;

    pub(crate) const BUILTINS: &[i64] = &[
        MIN,
        STARTUP,
        FIRST,
        PRE_UPDATE,
        UPDATE,
        POST_UPDATE,
        PRE_DRAW,
        DRAW,
        POST_DRAW,
        STATE_TRANSITION,
        STATE_ON_EXIT,
        STATE_ON_ENTER,
        STATE_UPDATE,
        LAST,
        EXIT,
    ];
}

fn mix_hash(a: u64, b: u64) -> u64 {
    a ^ b.wrapping_mul(0x9E3779B97F4A7C15).rotate_left(23)
}

fn hash_value<V: Hash>(value: &V) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Fold a hash into a `band`-sized slot starting at `base`. Two distinct
/// inputs can land on the same slot — see the state-stage collision note on
/// [`on_enter`].
fn banded_priority(base: i64, band: i64, hash: u64) -> i64 {
    base + (hash % band as u64) as i64
}

const STATE_BAND: i64 = 100_000;

/// Deterministic stage priority for `OnEnter(E::value)`.
///
/// Two distinct `(E, value)` pairs can hash into the same slot; this crate
/// accepts that risk (documented, not detected) rather than widen the band.
pub fn on_enter<E: 'static, V: Hash>(value: &V) -> i64 {
    banded_priority(priority::STATE_ON_ENTER, STATE_BAND, mix_hash(type_hash::<E>(), hash_value(value)))
}

/// Deterministic stage priority for `OnExit(E::value)`.
pub fn on_exit<E: 'static, V: Hash>(value: &V) -> i64 {
    banded_priority(priority::STATE_ON_EXIT, STATE_BAND, mix_hash(type_hash::<E>(), hash_value(value)))
}

/// Deterministic stage priority for `InState(E::value)`.
pub fn in_state<E: 'static, V: Hash>(value: &V) -> i64 {
    banded_priority(priority::STATE_UPDATE, STATE_BAND, mix_hash(type_hash::<E>(), hash_value(value)))
}

/// Hash-derived priority for a named custom stage, in the
/// [`priority::CUSTOM_MIN`]-and-up range.
pub fn custom_stage(name: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    priority::CUSTOM_MIN + (hasher.finish() % 1_000_000_000) as i64
}

struct DiscardHandledSystem<T>(PhantomData<T>);

impl<T: 'static> ErasedSystem for DiscardHandledSystem<T> {
    fn run(&mut self, manager: &mut Manager) -> Result<()> {
        manager.resources_mut().get_or_insert_with(EventStore::<T>::new).discard_handled();
        Ok(())
    }
}

/// Priority-ordered stages of cached systems, driven one `run_stage(s)` call
/// at a time by the host.
#[derive(Default)]
pub struct Scheduler {
    stages: BTreeMap<i64, Vec<SystemHandle>>,
}

impl Scheduler {
    /// A fresh scheduler with every built-in stage already present (and
    /// empty).
    pub fn new() -> Self {
        let mut stages = BTreeMap::new();
        for &p in priority::BUILTINS {
            stages.insert(p, Vec::new());
        }
        Self { stages }
    }

    /// Register an empty stage at `priority`. Fails if out of `[MIN, EXIT]`
    /// bounds or already present.
    pub fn add_stage(&mut self, priority: i64) -> Result<()> {
        if !(self::priority::MIN..=self::priority::EXIT).contains(&priority) {
            return Err(EcsError::InvalidStageBounds);
        }
        if self.stages.contains_key(&priority) {
            return Err(EcsError::StageExists(priority));
        }
        self.stages.insert(priority, Vec::new());
        Ok(())
    }

    /// Append `handle` to `priority`'s system list. Insertion order is
    /// execution order within the stage.
    pub fn add_system(&mut self, priority: i64, handle: SystemHandle) -> Result<()> {
        self.stages
            .get_mut(&priority)
            .ok_or(EcsError::StageNotFound(priority))?
            .push(handle);
        Ok(())
    }

    /// Run every system in `priority`'s stage, in insertion order. The first
    /// system error aborts the stage; later systems in it do not run.
    pub fn run_stage(&mut self, manager: &mut Manager, priority: i64) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = tracing::debug_span!("stage", priority).entered();

        let handles = self
            .stages
            .get(&priority)
            .ok_or(EcsError::StageNotFound(priority))?
            .clone();
        for handle in handles {
            manager.run_system(handle)?;
        }
        Ok(())
    }

    /// As [`Scheduler::run_stage`], but a missing stage is treated as
    /// empty rather than an error — used for `OnEnter`/`OnExit` lookups,
    /// which are allowed to target a stage nobody registered systems into.
    fn run_stage_if_present(&mut self, manager: &mut Manager, priority: i64) -> Result<()> {
        match self.run_stage(manager, priority) {
            Err(EcsError::StageNotFound(_)) => Ok(()),
            other => other,
        }
    }

    /// Run every registered stage whose priority falls in `[start, end]`,
    /// in ascending order.
    pub fn run_stages(&mut self, manager: &mut Manager, start: i64, end: i64) -> Result<()> {
        if start > end {
            return Err(EcsError::InvalidStageBounds);
        }
        let priorities: Vec<i64> = self.stages.range(start..=end).map(|(p, _)| *p).collect();
        for p in priorities {
            self.run_stage(manager, p)?;
        }
        Ok(())
    }

    pub fn get_stage_info(&self) -> Vec<(i64, usize)> {
        self.stages.iter().map(|(p, systems)| (*p, systems.len())).collect()
    }

    /// Create `T`'s `EventStore` (if it doesn't exist yet) and install a
    /// cleanup system at the terminal (`Last`) stage that discards its
    /// handled events every pass.
    pub fn register_event<T: 'static>(&mut self, manager: &mut Manager) -> SystemHandle {
        manager.resources_mut().get_or_insert_with(EventStore::<T>::new);
        let hash = mix_hash(type_hash::<T>(), 0xE7E2_7000_u64);
        let handle = manager.register_system(hash, Box::new(DiscardHandledSystem::<T>(PhantomData)));
        self.add_system(priority::LAST, handle)
            .expect("Last is always present, installed by Scheduler::new");
        handle
    }

    /// Install the `StateManager<E>` resource backing [`crate::system::State`]/
    /// [`crate::system::NextState`] for enum `E`. Fails with
    /// `StateAlreadyRegistered` if called twice for the same `E`.
    pub fn register_state<E: 'static>(&mut self, manager: &mut Manager, initial: E) -> Result<()> {
        if manager.resources().has_resource::<StateManager<E>>() {
            return Err(EcsError::StateAlreadyRegistered);
        }
        manager.resources_mut().add_resource(StateManager::new(initial))?;
        Ok(())
    }

    /// Transition registered state `E` to `value`: no-op if already current,
    /// otherwise runs `OnExit(old)` (if any), sets the new value, then runs
    /// `OnEnter(value)` (if any).
    pub fn transition_to<E>(&mut self, manager: &mut Manager, value: E) -> Result<()>
    where
        E: Clone + PartialEq + Hash + 'static,
    {
        let type_h = type_hash::<E>();
        let old = {
            let sm = manager
                .resources_mut()
                .get_resource_mut::<StateManager<E>>()
                .ok_or(EcsError::StateNotRegistered)?;
            if sm.current.as_ref() == Some(&value) {
                return Ok(());
            }
            let old = sm.current.take();
            sm.current = Some(value.clone());
            old
        };

        if let Some(old_value) = old {
            let exit = banded_priority(priority::STATE_ON_EXIT, STATE_BAND, mix_hash(type_h, hash_value(&old_value)));
            self.run_stage_if_present(manager, exit)?;
        }
        let enter = banded_priority(priority::STATE_ON_ENTER, STATE_BAND, mix_hash(type_h, hash_value(&value)));
        self.run_stage_if_present(manager, enter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag(bool);

    #[test]
    fn stage_ordering_scenario_s4() {
        let mut manager = Manager::new();
        manager.resources_mut().add_resource(Flag(false)).unwrap();
        let mut scheduler = Scheduler::new();

        scheduler.add_stage(150_000).unwrap();
        fn flip(mut flag: crate::system::ResMut<Flag>) {
            flag.0 = true;
        }
        let handle = manager.add_system(flip);
        scheduler.add_system(150_000, handle).unwrap();

        scheduler.run_stages(&mut manager, priority::FIRST, priority::POST_UPDATE).unwrap();
        assert!(manager.resources().get_resource::<Flag>().unwrap().0);
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let mut scheduler = Scheduler::new();
        assert!(matches!(scheduler.add_stage(priority::UPDATE), Err(EcsError::StageExists(_))));
    }

    #[test]
    fn out_of_range_stage_is_rejected() {
        let mut scheduler = Scheduler::new();
        assert!(matches!(scheduler.add_stage(-1), Err(EcsError::InvalidStageBounds)));
    }

    #[derive(Clone, PartialEq, Hash)]
    enum GameState {
        Menu,
        Playing,
    }

    struct Counter(u32);

    #[test]
    fn state_transition_scenario_s5() {
        let mut manager = Manager::new();
        manager.resources_mut().add_resource(Counter(0)).unwrap();
        let mut scheduler = Scheduler::new();
        scheduler.register_state(&mut manager, GameState::Menu).unwrap();

        let enter_playing = on_enter::<GameState, GameState>(&GameState::Playing);
        scheduler.add_stage(enter_playing).ok();
        fn set_counter(mut counter: crate::system::ResMut<Counter>) {
            counter.0 = 1;
        }
        let handle = manager.add_system(set_counter);
        scheduler.add_system(enter_playing, handle).unwrap();

        scheduler.transition_to(&mut manager, GameState::Playing).unwrap();
        assert_eq!(manager.resources().get_resource::<Counter>().unwrap().0, 1);

        manager.resources_mut().get_resource_mut::<Counter>().unwrap().0 = 99;
        scheduler.transition_to(&mut manager, GameState::Playing).unwrap();
        assert_eq!(manager.resources().get_resource::<Counter>().unwrap().0, 99);
    }

    #[test]
    fn register_event_installs_discard_at_last_stage() {
        let mut manager = Manager::new();
        let mut scheduler = Scheduler::new();
        scheduler.register_event::<u8>(&mut manager);
        {
            let store = manager.resources_mut().get_resource_mut::<EventStore<u8>>().unwrap();
            store.push(1);
            let mut iter = store.iterator();
            iter.next();
            iter.mark_handled();
        }
        scheduler.run_stage(&mut manager, priority::LAST).unwrap();
        assert_eq!(manager.resources().get_resource::<EventStore<u8>>().unwrap().count(), 0);
    }
}
