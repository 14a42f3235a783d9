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

//! `tracing` integration, enabled by the `profiling` feature.
//!
//! With the feature on, [`crate::manager::Manager::run_system`],
//! [`crate::schedule::Scheduler::run_stage`], and archetype migration inside
//! [`crate::world::World::add`] each open a span, so a subscriber installed
//! with [`init_subscriber`] (or any other `tracing` subscriber) sees per-
//! system and per-stage timing plus migration traffic without any
//! instrumentation in host code. With the feature off, these call sites
//! compile away entirely — there is no runtime cost and no `tracing`
//! dependency pulled in.
//!
//! ```ignore
//! use archetype_manager::profiling::init_subscriber;
//!
//! init_subscriber();
//! // RUST_LOG=archetype_manager=trace cargo run --features profiling
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

/// Install a global `tracing` subscriber that prints formatted spans to
/// stdout and honors `RUST_LOG`. Convenience for examples and benches; a
/// real host is free to install its own subscriber instead — this crate
/// never installs one on its own.
pub fn init_subscriber() {
    let subscriber = Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env());
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A non-blocking file appender, for hosts that want spans written to a
/// rolling log file instead of stdout. Returns the writer and the guard
/// that must be kept alive for buffered lines to flush.
pub fn file_subscriber(
    directory: impl AsRef<std::path::Path>,
    file_name_prefix: impl AsRef<std::path::Path>,
) -> (tracing_appender::non_blocking::NonBlocking, tracing_appender::non_blocking::WorkerGuard) {
    let appender = tracing_appender::rolling::daily(directory, file_name_prefix);
    tracing_appender::non_blocking(appender)
}
