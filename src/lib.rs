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

//! Archetype-based Entity Component System runtime.
//!
//! This crate is an in-process simulation substrate: a columnar archetype
//! store, a signature-matching query engine, a system-parameter abstraction
//! that turns plain functions into cacheable, resolvable units of work, and
//! a priority-staged scheduler with a state-machine subsystem on top. It has
//! no opinion about rendering, input, or networking — those are a host
//! application's problem; [`Manager`] only ever reasons about entities,
//! components, resources, relations, and the systems that touch them.
//!
//! A host typically:
//! 1. builds a [`Manager`] and a [`Scheduler`];
//! 2. registers one or more [`Plugin`]s through a [`PluginManager`], each of
//!    which adds resources, systems, stages, and events;
//! 3. drives the scheduler by calling `run_stages` once per tick.
//!
//! See `schedule::priority` for the built-in stage layout and `system` for
//! the full set of parameter kinds a system function may take.

pub mod archetype;
pub mod command;
pub mod component;
pub mod debug;
pub mod entity;
pub mod error;
pub mod event;
pub mod manager;
pub mod plugin;
pub mod query;
pub mod reflect;
pub mod relations;
pub mod resource;
pub mod schedule;
pub mod serialization;
pub mod sparse_set;
pub mod store;
pub mod system;
pub mod world;

#[cfg(feature = "profiling")]
pub mod profiling;

pub mod prelude;

pub use command::Commands;
pub use component::{Bundle, Component};
pub use entity::EntityId;
pub use error::{EcsError, Result};
pub use event::EventStore;
pub use manager::{Manager, SystemHandle};
pub use plugin::{Plugin, PluginManager};
pub use query::{Query, Without};
pub use relations::{Relation, RelationKind, RelationManager};
pub use resource::ResourceTable;
pub use schedule::Scheduler;
pub use system::{
    chain, pipe, run_if, EventReader, EventWriter, IntoCondition, IntoSystem, IntoTypedSystem, Local,
    NextState, OnAdded, OnRemoved, Res, ResMut, Single, State,
};
pub use world::World;
