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

//! FIFO lot-matching policy (§4.7.1), resolving Open Question 1.
//!
//! Each symbol owns an ordered queue of open lots. A fill first
//! consumes/reduces opposite-direction lots oldest-first, realizing a
//! `CompletedTrade` for every unit closed; any leftover quantity opens a
//! new lot at the back of the queue.

use std::collections::{HashMap, VecDeque};

use replay_core::{Direction, Symbol, Timestamp};

/// Smallest quantity treated as non-zero; guards against float residue
/// leaving a fully-closed lot sitting in the queue forever.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Lot {
	entry_price: f64,
	entry_time: Timestamp,
	quantity: f64,
	direction: Direction,
}

/// A trade realized by an opposite-direction fill closing (fully or
/// partially) a previously open lot.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTrade {
	pub symbol: Symbol,
	pub direction: Direction,
	pub quantity: f64,
	pub entry_price: f64,
	pub exit_price: f64,
	pub entry_time: Timestamp,
	pub exit_time: Timestamp,
	pub commission: f64,
}

impl CompletedTrade {
	/// Realized profit/loss for this closed quantity, net of the
	/// commission apportioned to it.
	pub fn pnl(&self) -> f64 {
		(self.exit_price - self.entry_price) * self.direction.sign() * self.quantity - self.commission
	}
}

/// Per-symbol FIFO lot books, producing a `CompletedTrade` ledger as
/// fills are applied.
#[derive(Debug, Default)]
pub struct LotMatcher {
	books: HashMap<Symbol, VecDeque<Lot>>,
}

impl LotMatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies one fill: closes opposite-direction lots oldest-first,
	/// then opens a new lot with whatever quantity remains. `commission`
	/// is apportioned across closed trades and the residual new lot in
	/// proportion to the quantity each consumes.
	pub fn apply_fill(
		&mut self,
		symbol: impl Into<Symbol>,
		direction: Direction,
		quantity: f64,
		price: f64,
		commission: f64,
		timestamp: Timestamp,
	) -> Vec<CompletedTrade> {
		let symbol = symbol.into();
		let total_quantity = quantity;
		let mut remaining = quantity;
		let mut completed = Vec::new();
		let book = self.books.entry(symbol.clone()).or_default();

		while remaining > EPSILON {
			let opposes = matches!(book.front(), Some(lot) if lot.direction != direction);
			if !opposes {
				break;
			}
			let lot = book.front_mut().unwrap();
			let matched = remaining.min(lot.quantity);
			let apportioned_commission = commission * (matched / total_quantity);
			completed.push(CompletedTrade {
				symbol: symbol.clone(),
				direction: lot.direction,
				quantity: matched,
				entry_price: lot.entry_price,
				exit_price: price,
				entry_time: lot.entry_time,
				exit_time: timestamp,
				commission: apportioned_commission,
			});
			lot.quantity -= matched;
			remaining -= matched;
			if lot.quantity <= EPSILON {
				book.pop_front();
			}
		}

		if remaining > EPSILON {
			book.push_back(Lot { entry_price: price, entry_time: timestamp, quantity: remaining, direction });
		}

		completed
	}

	/// Open lots remaining for a symbol, oldest first (for diagnostics).
	pub fn open_lots(&self, symbol: &str) -> usize {
		self.books.get(symbol).map(VecDeque::len).unwrap_or(0)
	}
}
