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

//! External collaborator interfaces (§6): strategies consume market
//! events and emit signals through a thin sink façade over the engine.

use replay_core::{Event, MarketEvent};

/// A thin façade over `EngineManager::send_event`/`EngineHandle::send_event`,
/// so a `Strategy` never needs to hold the engine itself.
pub trait SignalSink {
	fn send_signal(&mut self, event: Event) -> bool;
}

/// A strategy reacts to market data and may emit signal events through
/// `ctx`. Strategies are external collaborators; the backtester only
/// defines the shape of the contract.
pub trait Strategy: Send {
	fn on_market_data(&mut self, event: &MarketEvent, ctx: &mut dyn SignalSink);
}
