// Copyright 2025 itscheems
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

//! Replay Controller - time-paced iteration over tabular market data
//!
//! Streams rows from one ([`ReplayController`]) or several
//! ([`MultiReplayController`]) time-ordered sources under a configurable
//! pacing policy, invoking registered callbacks per row. Has no notion of
//! the typed `Event` model or event dispatch; that is the engine crate's
//! job. A single worker thread per controller, a `std::sync::Mutex`-guarded
//! state struct, and a `Condvar`-based "go" signal for pause/resume, in the
//! shape of the matching engine's single-threaded core loop.

pub mod config;
pub mod controller;
pub mod error;
pub mod multi;
pub mod pacing;
pub mod source;
pub mod status;

pub use config::{MultiReplayConfig, ReplayConfig};
pub use controller::{Callback, CallbackId, ReplayController};
pub use error::ReplayError;
pub use multi::MultiReplayController;
pub use pacing::ReplayMode;
pub use source::{InMemoryTable, TabularSource};
pub use status::ReplayStatus;
