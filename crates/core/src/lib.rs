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

//! Replay Core - shared event model and row/value types
//!
//! This crate provides the typed event model shared by the replay
//! controller, event engine, and backtester crates. It has no threads
//! and no I/O: every type here is a plain value type, constructed,
//! compared, and displayed, nothing more.

pub mod event;
pub mod types;

pub use event::{
	AccountEvent, CustomEvent, Direction, Event, EventError, EventType, FillEvent, MarketData,
	MarketEvent, Ohlcv, OrderEvent, OrderType, SignalEvent,
};
pub use types::{CellValue, EventId, OrderId, Row, Symbol, Timestamp};
