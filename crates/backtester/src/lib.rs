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

//! Event-Driven Backtester - translates signals into simulated orders
//! and fills on top of an [`event_engine::EngineManager`], maintaining
//! cash, positions, and equity history (§3.4, §4.7).

pub mod backtester;
pub mod config;
pub mod error;
pub mod lots;
pub mod performance;
pub mod portfolio;
pub mod strategy;

pub use backtester::EventDrivenBacktester;
pub use config::BacktesterConfig;
pub use error::BacktesterError;
pub use lots::{CompletedTrade, LotMatcher};
pub use performance::{PerformanceAnalyzer, PerformanceMetrics};
pub use portfolio::{EquityPoint, Portfolio, Transaction};
pub use strategy::{SignalSink, Strategy};
