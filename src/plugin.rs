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

//! Ordered composition of reusable setup/teardown units.
//!
//! A [`Plugin`] bundles a slice of `Manager`/`Scheduler` wiring — resources,
//! registered systems, stages, event types — behind one type a host can add
//! once. [`PluginManager`] keeps plugins in registration order, builds them
//! fatally (the first failure aborts [`PluginManager::build`]) and tears
//! them down in reverse, best-effort, so a later plugin's cleanup still runs
//! even if an earlier one's failed.

use rustc_hash::FxHashMap;

use crate::error::{EcsError, Result};
use crate::manager::Manager;
use crate::reflect::{type_hash, TypeHash};
use crate::schedule::Scheduler;

/// One unit of reusable `Manager`/`Scheduler` setup.
pub trait Plugin: std::any::Any {
    /// Register resources, systems, and stages. Called once, in the order
    /// the plugin was added, by [`PluginManager::build`].
    fn build(&mut self, manager: &mut Manager, scheduler: &mut Scheduler) -> Result<()>;

    /// Undo whatever `build` set up. Called in reverse registration order by
    /// [`PluginManager::deinit`]. Default is a no-op.
    fn deinit(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
        Ok(())
    }

    /// Name shown by [`PluginManager::names`]; defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Supports [`PluginManager::get`]'s downcast. Provided automatically.
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct Entry {
    plugin: Box<dyn Plugin>,
}

/// A registration-ordered collection of plugins.
#[derive(Default)]
pub struct PluginManager {
    entries: Vec<Entry>,
    by_hash: FxHashMap<TypeHash, usize>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under its concrete type. Fails with
    /// `PluginAlreadyExists` if `T` is already registered.
    pub fn add<T: Plugin>(&mut self, plugin: T) -> Result<()> {
        let hash = type_hash::<T>();
        if self.by_hash.contains_key(&hash) {
            return Err(EcsError::PluginAlreadyExists);
        }
        self.by_hash.insert(hash, self.entries.len());
        self.entries.push(Entry { plugin: Box::new(plugin) });
        Ok(())
    }

    /// Register every plugin produced by `bundle` against a shared
    /// registration slot, so a bundle of plugins can be added as one unit.
    pub fn add_bundle<F>(&mut self, bundle: F) -> Result<()>
    where
        F: FnOnce(&mut PluginManager) -> Result<()>,
    {
        bundle(self)
    }

    /// Build every registered plugin, in registration order. The first
    /// error aborts the pass; plugins after it are left unbuilt.
    pub fn build(&mut self, manager: &mut Manager, scheduler: &mut Scheduler) -> Result<()> {
        for entry in &mut self.entries {
            entry.plugin.build(manager, scheduler)?;
        }
        Ok(())
    }

    /// Tear down every registered plugin, in reverse registration order.
    /// Every plugin's `deinit` runs regardless of earlier failures; their
    /// errors are collected and returned together.
    pub fn deinit(&mut self, manager: &mut Manager, scheduler: &mut Scheduler) -> Vec<EcsError> {
        let mut errors = Vec::new();
        for entry in self.entries.iter_mut().rev() {
            if let Err(e) = entry.plugin.deinit(manager, scheduler) {
                errors.push(e);
            }
        }
        errors
    }

    pub fn get<T: Plugin>(&self) -> Option<&T> {
        let idx = *self.by_hash.get(&type_hash::<T>())?;
        self.entries[idx].plugin.as_any().downcast_ref::<T>()
    }

    pub fn has<T: Plugin>(&self) -> bool {
        self.by_hash.contains_key(&type_hash::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.plugin.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        log: Rc<RefCell<Vec<&'static str>>>,
        label: &'static str,
        fail_deinit: bool,
    }

    impl Plugin for Recording {
        fn build(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.log.borrow_mut().push(self.label);
            Ok(())
        }

        fn deinit(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.log.borrow_mut().push(self.label);
            if self.fail_deinit {
                Err(EcsError::User(self.label.to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct First(Rc<RefCell<Vec<&'static str>>>);
    struct Second(Rc<RefCell<Vec<&'static str>>>);

    impl Plugin for First {
        fn build(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.0.borrow_mut().push("first");
            Ok(())
        }
        fn deinit(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.0.borrow_mut().push("first-deinit");
            Err(EcsError::User("first failed".to_string()))
        }
    }

    impl Plugin for Second {
        fn build(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.0.borrow_mut().push("second");
            Ok(())
        }
        fn deinit(&mut self, _manager: &mut Manager, _scheduler: &mut Scheduler) -> Result<()> {
            self.0.borrow_mut().push("second-deinit");
            Ok(())
        }
    }

    #[test]
    fn build_runs_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = Manager::new();
        let mut scheduler = Scheduler::new();
        let mut plugins = PluginManager::new();
        plugins
            .add(Recording {
                log: log.clone(),
                label: "a",
                fail_deinit: false,
            })
            .unwrap();
        plugins
            .add(Recording {
                log: log.clone(),
                label: "b",
                fail_deinit: false,
            })
            .unwrap();
        plugins.build(&mut manager, &mut scheduler).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins
            .add(Recording {
                log: log.clone(),
                label: "a",
                fail_deinit: false,
            })
            .unwrap();
        let err = plugins.add(Recording {
            log,
            label: "a-again",
            fail_deinit: false,
        });
        assert!(matches!(err, Err(EcsError::PluginAlreadyExists)));
    }

    #[test]
    fn deinit_runs_lifo_and_does_not_skip_after_a_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = Manager::new();
        let mut scheduler = Scheduler::new();
        let mut plugins = PluginManager::new();
        plugins.add(First(log.clone())).unwrap();
        plugins.add(Second(log.clone())).unwrap();
        plugins.build(&mut manager, &mut scheduler).unwrap();

        let errors = plugins.deinit(&mut manager, &mut scheduler);
        assert_eq!(*log.borrow(), vec!["first", "second", "second-deinit", "first-deinit"]);
        assert_eq!(errors.len(), 1);
    }
}
