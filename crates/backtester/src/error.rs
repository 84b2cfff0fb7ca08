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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacktesterError {
	#[error("initial_capital must be > 0, got {0}")]
	InvalidInitialCapital(f64),

	#[error("commission_rate must be in [0, 1), got {0}")]
	InvalidCommissionRate(f64),

	#[error("slippage must be >= 0, got {0}")]
	InvalidSlippage(f64),

	#[error("symbol {0} has no observed market price yet")]
	UnknownSymbol(String),

	#[error("engine error: {0}")]
	Engine(#[from] event_engine::EngineError),

	#[error("config error: {0}")]
	Config(#[from] config::ConfigError),
}
