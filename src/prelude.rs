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

//! Convenient re-exports of commonly used types.
//!
//! ```
//! use archetype_manager::prelude::*;
//! ```

pub use crate::command::{Commands, EntityCommands};
pub use crate::component::{Bundle, Component};
pub use crate::entity::EntityId;
pub use crate::error::{EcsError, Result};
pub use crate::event::EventStore;
pub use crate::manager::{Manager, SystemHandle};
pub use crate::plugin::{Plugin, PluginManager};
pub use crate::query::{Query, Without};
pub use crate::relations::{Relation, RelationKind, RelationManager};
pub use crate::resource::ResourceTable;
pub use crate::schedule::{self, Scheduler};
pub use crate::system::{
    chain, pipe, run_if, EventReader, EventWriter, IntoCondition, IntoSystem, IntoTypedSystem, Local,
    NextState, OnAdded, OnRemoved, Res, ResMut, Single, State,
};
pub use crate::world::World;
