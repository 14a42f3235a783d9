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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Operation on an id whose generation does not match, or an out-of-range id.
    EntityNotAlive,

    /// Command buffer error.
    CommandError(String),

    /// Stage at the given priority does not exist.
    StageNotFound(i64),

    /// Stage already registered at the given priority.
    StageExists(i64),

    /// Stage priority outside the legal `[Min, Exit]` range, or `run_stages(start, end)` with `start > end`.
    InvalidStageBounds,

    /// Lookup of an unknown or removed cached system handle.
    InvalidSystemHandle,

    /// State enum type was not registered before use.
    StateNotRegistered,

    /// State enum type was registered twice.
    StateAlreadyRegistered,

    /// Duplicate plugin type passed to `PluginManager::add`.
    PluginAlreadyExists,

    /// `Single` query matched zero archetype rows.
    SingleFoundNoMatches,

    /// `Single` query matched more than one archetype row.
    SingleFoundMultipleMatches,

    /// Stream ended before the declared number of bytes/entries were read.
    UnexpectedEndOfStream,

    /// `Res<T>`/`get_resource::<T>` requested but T is not present.
    ResourceNotFound(String),

    /// Duplicate `add_resource::<T>`.
    ResourceAlreadyExists(u64),

    /// Allocation failure from any layer.
    OutOfMemory,

    /// A system or host callback raised an application-defined error.
    User(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotAlive => write!(f, "Entity not alive"),
            EcsError::CommandError(msg) => write!(f, "Command error: {msg}"),
            EcsError::StageNotFound(p) => write!(f, "Stage not found: {p}"),
            EcsError::StageExists(p) => write!(f, "Stage already exists: {p}"),
            EcsError::InvalidStageBounds => write!(f, "Invalid stage bounds"),
            EcsError::InvalidSystemHandle => write!(f, "Invalid or unknown system handle"),
            EcsError::StateNotRegistered => write!(f, "State type not registered"),
            EcsError::StateAlreadyRegistered => write!(f, "State type already registered"),
            EcsError::PluginAlreadyExists => write!(f, "Plugin already registered"),
            EcsError::SingleFoundNoMatches => write!(f, "Single<_> query matched no entities"),
            EcsError::SingleFoundMultipleMatches => {
                write!(f, "Single<_> query matched more than one entity")
            }
            EcsError::UnexpectedEndOfStream => write!(f, "Unexpected end of stream"),
            EcsError::ResourceNotFound(name) => write!(f, "Resource not found: {name}"),
            EcsError::ResourceAlreadyExists(hash) => {
                write!(f, "Resource already exists: type hash {hash:#018x}")
            }
            EcsError::OutOfMemory => write!(f, "Out of memory"),
            EcsError::User(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
