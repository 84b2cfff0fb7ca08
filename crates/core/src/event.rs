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

//! The typed event model.
//!
//! Events are immutable once constructed. `event_id` starts as `None` and
//! is assigned exactly once, either by the producer (when it already knows
//! the id) or by the engine at the moment the event is enqueued
//! (`Event::assign_id`). Comparing two events compares their fields, not
//! their identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EventId, OrderId, Row, Symbol, Timestamp};

/// Errors raised while constructing an event from invalid inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
	#[error("signal strength must be within [0, 1], got {0}")]
	InvalidStrength(String),
	#[error("order quantity must be > 0, got {0}")]
	InvalidQuantity(String),
	#[error("commission must be >= 0, got {0}")]
	InvalidCommission(String),
}

/// Trade direction: long (+1) or short (-1). The two-variant enum makes
/// the spec's `direction ∈ {-1,+1}` invariant a type-level guarantee
/// rather than a runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
	Long,
	Short,
}

impl Direction {
	/// The signed multiplier used in cash/position arithmetic.
	pub fn sign(self) -> f64 {
		match self {
			Direction::Long => 1.0,
			Direction::Short => -1.0,
		}
	}

	pub fn from_sign(sign: i32) -> Option<Self> {
		match sign {
			1 => Some(Direction::Long),
			-1 => Some(Direction::Short),
			_ => None,
		}
	}

	pub fn opposite(self) -> Self {
		match self {
			Direction::Long => Direction::Short,
			Direction::Short => Direction::Long,
		}
	}
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Direction::Long => write!(f, "+1"),
			Direction::Short => write!(f, "-1"),
		}
	}
}

/// Order type, per the dispatch table in §3.1 of the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
	Market,
	Limit,
	Stop,
	StopLimit,
}

/// OHLCV bar, the common shape for Market event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
	pub open: f64,
	pub high: f64,
	pub low: f64,
	pub close: f64,
	pub volume: f64,
}

/// Market event payload: a structured OHLCV bar, or an opaque column map
/// for sources that don't shape their rows as bars (e.g. tick data, order
/// book snapshots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketData {
	Ohlcv(Ohlcv),
	Fields(Row),
}

impl MarketData {
	/// The price used for mark-to-market and execution: `close` for an
	/// OHLCV bar, or the `close` column (falling back to `price`) for an
	/// opaque field map.
	pub fn price(&self) -> Option<f64> {
		match self {
			MarketData::Ohlcv(bar) => Some(bar.close),
			MarketData::Fields(row) => row
				.get("close")
				.or_else(|| row.get("price"))
				.and_then(|v| v.as_f64()),
		}
	}
}

macro_rules! event_tag_enum {
	($($variant:ident),+ $(,)?) => {
		/// The event tag, used to key the handler table.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		pub enum EventType {
			$($variant),+
		}

		impl fmt::Display for EventType {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				match self {
					$(EventType::$variant => write!(f, stringify!($variant))),+
				}
			}
		}
	};
}

event_tag_enum!(Market, Signal, Order, Fill, Account, Custom);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub symbol: Symbol,
	pub data: MarketData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub symbol: Symbol,
	pub direction: Direction,
	pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub symbol: Symbol,
	pub order_id: OrderId,
	pub order_type: OrderType,
	pub quantity: f64,
	pub direction: Direction,
	pub limit_price: Option<f64>,
	pub stop_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub symbol: Symbol,
	pub order_id: OrderId,
	pub quantity: f64,
	pub direction: Direction,
	pub fill_price: f64,
	pub commission: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub balance: f64,
	pub available: f64,
	pub margin: f64,
}

/// Open extension point: a domain-specific event not covered by the
/// closed variants above. `tag` lets callers distinguish sub-kinds of
/// `Custom` without widening the core enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
	pub event_id: Option<EventId>,
	pub timestamp: Timestamp,
	pub source: Option<String>,
	pub tag: String,
	pub data: serde_json::Value,
}

/// The closed event variant set, with an open `Custom` escape hatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
	Market(MarketEvent),
	Signal(SignalEvent),
	Order(OrderEvent),
	Fill(FillEvent),
	Account(AccountEvent),
	Custom(CustomEvent),
}

impl Event {
	pub fn market(timestamp: Timestamp, symbol: impl Into<Symbol>, data: MarketData) -> Self {
		Event::Market(MarketEvent {
			event_id: None,
			timestamp,
			source: None,
			symbol: symbol.into(),
			data,
		})
	}

	pub fn signal(
		timestamp: Timestamp,
		symbol: impl Into<Symbol>,
		direction: Direction,
		strength: f64,
	) -> Result<Self, EventError> {
		if !(0.0..=1.0).contains(&strength) {
			return Err(EventError::InvalidStrength(strength.to_string()));
		}
		Ok(Event::Signal(SignalEvent {
			event_id: None,
			timestamp,
			source: None,
			symbol: symbol.into(),
			direction,
			strength,
		}))
	}

	#[allow(clippy::too_many_arguments)]
	pub fn order(
		timestamp: Timestamp,
		symbol: impl Into<Symbol>,
		order_id: impl Into<OrderId>,
		order_type: OrderType,
		quantity: f64,
		direction: Direction,
		limit_price: Option<f64>,
		stop_price: Option<f64>,
	) -> Result<Self, EventError> {
		if !(quantity > 0.0) {
			return Err(EventError::InvalidQuantity(quantity.to_string()));
		}
		Ok(Event::Order(OrderEvent {
			event_id: None,
			timestamp,
			source: None,
			symbol: symbol.into(),
			order_id: order_id.into(),
			order_type,
			quantity,
			direction,
			limit_price,
			stop_price,
		}))
	}

	#[allow(clippy::too_many_arguments)]
	pub fn fill(
		timestamp: Timestamp,
		symbol: impl Into<Symbol>,
		order_id: impl Into<OrderId>,
		quantity: f64,
		direction: Direction,
		fill_price: f64,
		commission: f64,
	) -> Result<Self, EventError> {
		if !(quantity > 0.0) {
			return Err(EventError::InvalidQuantity(quantity.to_string()));
		}
		if commission < 0.0 {
			return Err(EventError::InvalidCommission(commission.to_string()));
		}
		Ok(Event::Fill(FillEvent {
			event_id: None,
			timestamp,
			source: None,
			symbol: symbol.into(),
			order_id: order_id.into(),
			quantity,
			direction,
			fill_price,
			commission,
		}))
	}

	pub fn account(timestamp: Timestamp, balance: f64, available: f64, margin: f64) -> Self {
		Event::Account(AccountEvent {
			event_id: None,
			timestamp,
			source: None,
			balance,
			available,
			margin,
		})
	}

	pub fn custom(timestamp: Timestamp, tag: impl Into<String>, data: serde_json::Value) -> Self {
		Event::Custom(CustomEvent {
			event_id: None,
			timestamp,
			source: None,
			tag: tag.into(),
			data,
		})
	}

	pub fn event_type(&self) -> EventType {
		match self {
			Event::Market(_) => EventType::Market,
			Event::Signal(_) => EventType::Signal,
			Event::Order(_) => EventType::Order,
			Event::Fill(_) => EventType::Fill,
			Event::Account(_) => EventType::Account,
			Event::Custom(_) => EventType::Custom,
		}
	}

	pub fn timestamp(&self) -> Timestamp {
		match self {
			Event::Market(e) => e.timestamp,
			Event::Signal(e) => e.timestamp,
			Event::Order(e) => e.timestamp,
			Event::Fill(e) => e.timestamp,
			Event::Account(e) => e.timestamp,
			Event::Custom(e) => e.timestamp,
		}
	}

	pub fn event_id(&self) -> Option<EventId> {
		match self {
			Event::Market(e) => e.event_id,
			Event::Signal(e) => e.event_id,
			Event::Order(e) => e.event_id,
			Event::Fill(e) => e.event_id,
			Event::Account(e) => e.event_id,
			Event::Custom(e) => e.event_id,
		}
	}

	pub fn source(&self) -> Option<&str> {
		match self {
			Event::Market(e) => e.source.as_deref(),
			Event::Signal(e) => e.source.as_deref(),
			Event::Order(e) => e.order_source(),
			Event::Fill(e) => e.source.as_deref(),
			Event::Account(e) => e.source.as_deref(),
			Event::Custom(e) => e.source.as_deref(),
		}
	}

	/// Assigns the event id exactly once. A no-op if one is already set,
	/// matching the "assigned exactly once" invariant.
	pub fn assign_id(&mut self, id: EventId) {
		let slot = match self {
			Event::Market(e) => &mut e.event_id,
			Event::Signal(e) => &mut e.event_id,
			Event::Order(e) => &mut e.event_id,
			Event::Fill(e) => &mut e.event_id,
			Event::Account(e) => &mut e.event_id,
			Event::Custom(e) => &mut e.event_id,
		};
		if slot.is_none() {
			*slot = Some(id);
		}
	}

	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		let source = Some(source.into());
		match &mut self {
			Event::Market(e) => e.source = source,
			Event::Signal(e) => e.source = source,
			Event::Order(e) => e.source = source,
			Event::Fill(e) => e.source = source,
			Event::Account(e) => e.source = source,
			Event::Custom(e) => e.source = source,
		}
		self
	}
}

impl OrderEvent {
	fn order_source(&self) -> Option<&str> {
		self.source.as_deref()
	}
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.event_type(), self.timestamp().to_rfc3339())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};

	fn ts() -> Timestamp {
		Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
	}

	#[test]
	fn signal_rejects_out_of_range_strength() {
		let err = Event::signal(ts(), "AAPL", Direction::Long, 1.5).unwrap_err();
		assert_eq!(err, EventError::InvalidStrength("1.5".to_string()));
	}

	#[test]
	fn order_rejects_non_positive_quantity() {
		let err = Event::order(ts(), "AAPL", "o1", OrderType::Market, 0.0, Direction::Long, None, None)
			.unwrap_err();
		assert!(matches!(err, EventError::InvalidQuantity(_)));
	}

	#[test]
	fn equality_is_structural_not_identity() {
		let a = Event::signal(ts(), "AAPL", Direction::Long, 0.5).unwrap();
		let b = Event::signal(ts(), "AAPL", Direction::Long, 0.5).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn assign_id_is_idempotent() {
		let mut e = Event::signal(ts(), "AAPL", Direction::Long, 0.5).unwrap();
		e.assign_id(1);
		e.assign_id(2);
		assert_eq!(e.event_id(), Some(1));
	}

	#[test]
	fn display_includes_variant_and_timestamp() {
		let e = Event::signal(ts(), "AAPL", Direction::Long, 0.5).unwrap();
		let s = e.to_string();
		assert!(s.starts_with("Signal@"));
	}
}
