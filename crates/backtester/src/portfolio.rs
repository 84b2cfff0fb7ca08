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

//! Cash, positions, and open orders (§3.4).

use std::collections::HashMap;

use replay_core::{Direction, OrderEvent, OrderId, Symbol, Timestamp};

/// One completed execution, retained for diagnostics and the run-loop
/// summary (§3.4 `transaction_history`).
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
	pub timestamp: Timestamp,
	pub symbol: Symbol,
	pub direction: Direction,
	pub quantity: f64,
	pub price: f64,
	pub commission: f64,
	pub order_id: OrderId,
}

/// One (timestamp, equity, cash) sample, taken on every Market event
/// (§3.4 `equity_history`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
	pub timestamp: Timestamp,
	pub equity: f64,
	pub cash: f64,
}

/// Cash, signed positions, resting orders, and the append-only history
/// ledgers a backtester maintains (§3.4).
#[derive(Debug)]
pub struct Portfolio {
	pub initial_capital: f64,
	cash: f64,
	positions: HashMap<Symbol, f64>,
	last_price: HashMap<Symbol, f64>,
	open_orders: HashMap<OrderId, OrderEvent>,
	equity_history: Vec<EquityPoint>,
	transaction_history: Vec<Transaction>,
}

impl Portfolio {
	pub fn new(initial_capital: f64) -> Self {
		Self {
			initial_capital,
			cash: initial_capital,
			positions: HashMap::new(),
			last_price: HashMap::new(),
			open_orders: HashMap::new(),
			equity_history: Vec::new(),
			transaction_history: Vec::new(),
		}
	}

	pub fn cash(&self) -> f64 {
		self.cash
	}

	pub fn position(&self, symbol: &str) -> f64 {
		self.positions.get(symbol).copied().unwrap_or(0.0)
	}

	pub fn last_price_of(&self, symbol: &str) -> Option<f64> {
		self.last_price.get(symbol).copied()
	}

	pub fn equity_history(&self) -> &[EquityPoint] {
		&self.equity_history
	}

	pub fn transaction_history(&self) -> &[Transaction] {
		&self.transaction_history
	}

	/// Mark-to-market equity: cash plus every position valued at its
	/// latest observed price (§3.4 equity invariant).
	pub fn equity(&self) -> f64 {
		let marked: f64 = self
			.positions
			.iter()
			.map(|(symbol, qty)| qty * self.last_price.get(symbol).copied().unwrap_or(0.0))
			.sum();
		self.cash + marked
	}

	/// Updates the latest observed price for a symbol and records an
	/// equity-history sample, invoked on every Market event.
	pub fn on_market_price(&mut self, symbol: &str, price: f64, timestamp: Timestamp) {
		self.last_price.insert(symbol.to_string(), price);
		self.equity_history.push(EquityPoint { timestamp, equity: self.equity(), cash: self.cash });
	}

	pub fn register_open_order(&mut self, order: OrderEvent) {
		self.open_orders.insert(order.order_id.clone(), order);
	}

	pub fn open_order(&self, order_id: &str) -> Option<&OrderEvent> {
		self.open_orders.get(order_id)
	}

	/// Applies the cash and position invariants (§3.4) for a fill and
	/// records the transaction. Does not remove the order from
	/// `open_orders`; the caller does that once it has read the order
	/// out for execution bookkeeping.
	pub fn apply_fill(
		&mut self,
		order_id: &str,
		symbol: &str,
		direction: Direction,
		quantity: f64,
		price: f64,
		commission: f64,
		timestamp: Timestamp,
	) {
		self.cash -= direction.sign() * quantity * price + commission;
		*self.positions.entry(symbol.to_string()).or_insert(0.0) += direction.sign() * quantity;
		self.open_orders.remove(order_id);
		self.transaction_history.push(Transaction {
			timestamp,
			symbol: symbol.to_string(),
			direction,
			quantity,
			price,
			commission,
			order_id: order_id.to_string(),
		});
	}

	/// Fabricates a single synthetic equity point when the history is
	/// still empty, so downstream metrics are never computed over an
	/// empty series (§4.7 Run loop step 3, §4.8).
	pub fn ensure_equity_history(&mut self, timestamp: Timestamp) {
		if self.equity_history.is_empty() {
			self.equity_history.push(EquityPoint { timestamp, equity: self.cash, cash: self.cash });
		}
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
	fn buy_then_mark_reflects_equity_invariant() {
		let mut p = Portfolio::new(100_000.0);
		p.apply_fill("o1", "AAPL", Direction::Long, 10.0, 100.0, 1.0, ts());
		assert_eq!(p.cash(), 100_000.0 - 1_000.0 - 1.0);
		p.on_market_price("AAPL", 105.0, ts());
		assert_eq!(p.equity(), p.cash() + 10.0 * 105.0);
	}

	#[test]
	fn sell_reduces_position_and_credits_cash() {
		let mut p = Portfolio::new(100_000.0);
		p.apply_fill("o1", "AAPL", Direction::Long, 10.0, 100.0, 0.0, ts());
		p.apply_fill("o2", "AAPL", Direction::Short, 10.0, 110.0, 0.0, ts());
		assert_eq!(p.position("AAPL"), 0.0);
		assert_eq!(p.cash(), 100_000.0 - 1_000.0 + 1_100.0);
	}

	#[test]
	fn ensure_equity_history_only_fabricates_when_empty() {
		let mut p = Portfolio::new(50_000.0);
		p.ensure_equity_history(ts());
		assert_eq!(p.equity_history().len(), 1);
		p.ensure_equity_history(ts());
		assert_eq!(p.equity_history().len(), 1);
	}
}
