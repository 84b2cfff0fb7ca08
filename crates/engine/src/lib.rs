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

//! Event Engine - typed dispatch over a bounded queue, and the Replay
//! Engine Manager that feeds it from one or more replay controllers.
//!
//! A single dispatcher thread per engine, guarded by the same
//! Mutex/Condvar "go" signal shape as the replay controller. The handler
//! table is a plain insertion-ordered `Vec<(id, handler)>` per event type
//! plus a wildcard bucket, dispatched with the queue lock never held
//! across user code.

pub mod config;
pub mod counters;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod queue;
pub mod replay_manager;
pub mod status;

pub use config::EngineConfig;
pub use counters::PerformanceCounters;
pub use error::EngineError;
pub use handlers::{Handler, HandlerId, HandlerTable};
pub use manager::{EngineHandle, EngineManager};
pub use queue::{EventQueue, EventReceiver, EventSender, QueueError};
pub use replay_manager::{DataConverter, ReplayEngineManager};
pub use status::EngineStatus;
