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

//! Event-Driven Backtester (§4.7): an `EngineManager` specialization
//! that registers Market/Signal/Order/Fill handlers translating signals
//! into simulated fills and maintaining §3.4 portfolio state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use event_engine::{EngineConfig, EngineHandle, EngineManager};
use replay_core::{Direction, Event, EventType, MarketData, OrderType, Symbol, Timestamp};
use tracing::{debug, warn};

use crate::config::BacktesterConfig;
use crate::error::BacktesterError;
use crate::lots::{CompletedTrade, LotMatcher};
use crate::performance::{PerformanceAnalyzer, PerformanceMetrics};
use crate::portfolio::Portfolio;
use crate::strategy::{SignalSink, Strategy};

/// Thin façade over an [`EngineHandle`], the `SignalSink` a strategy uses
/// to emit signals without holding the engine itself (§6).
struct EngineSink(EngineHandle);

impl SignalSink for EngineSink {
	fn send_signal(&mut self, event: Event) -> bool {
		self.0.send_event(event)
	}
}

struct Shared {
	config: BacktesterConfig,
	portfolio: Portfolio,
	lots: LotMatcher,
	completed_trades: Vec<CompletedTrade>,
	strategies: Vec<Box<dyn Strategy>>,
	next_order_seq: u64,
}

impl Shared {
	fn next_order_id(&mut self) -> String {
		self.next_order_seq += 1;
		format!("bt-{}", self.next_order_seq)
	}
}

/// An `EngineManager` wired with the four handlers of §4.7, simulating
/// fills and maintaining cash/position/equity state per §3.4.
pub struct EventDrivenBacktester {
	engine: EngineManager,
	shared: Arc<Mutex<Shared>>,
}

impl EventDrivenBacktester {
	pub fn new(config: BacktesterConfig) -> Result<Self, BacktesterError> {
		config.validate()?;
		let engine = EngineManager::new(EngineConfig::default())?;
		let shared = Arc::new(Mutex::new(Shared {
			portfolio: Portfolio::new(config.initial_capital),
			lots: LotMatcher::new(),
			completed_trades: Vec::new(),
			strategies: Vec::new(),
			next_order_seq: 0,
			config,
		}));

		let backtester = Self { engine, shared };
		backtester.register_handlers();
		Ok(backtester)
	}

	pub fn attach_strategy(&self, strategy: Box<dyn Strategy>) {
		self.shared.lock().unwrap().strategies.push(strategy);
	}

	pub fn start(&mut self) -> Result<(), BacktesterError> {
		self.engine.start()?;
		Ok(())
	}

	pub fn stop(&mut self) -> bool {
		self.engine.stop()
	}

	pub fn handle(&self) -> EngineHandle {
		self.engine.handle()
	}

	pub fn cash(&self) -> f64 {
		self.shared.lock().unwrap().portfolio.cash()
	}

	pub fn position(&self, symbol: &str) -> f64 {
		self.shared.lock().unwrap().portfolio.position(symbol)
	}

	pub fn transaction_count(&self) -> usize {
		self.shared.lock().unwrap().portfolio.transaction_history().len()
	}

	/// Summary metrics over the run so far (§4.7 Run loop step 3, §4.8).
	/// Fabricates a synthetic equity point first if none was ever
	/// recorded, so metrics are always total.
	pub fn summary(&self, as_of: Timestamp) -> PerformanceMetrics {
		let mut shared = self.shared.lock().unwrap();
		shared.portfolio.ensure_equity_history(as_of);
		PerformanceAnalyzer::calculate_metrics(shared.portfolio.equity_history(), &shared.completed_trades)
	}

	/// Batch-mode run loop (§4.7 Run loop): for each row index, enqueues a
	/// Market event per symbol, then drains the engine before moving to
	/// the next index. `data` maps each symbol to its own time-ordered
	/// `(timestamp, price)` series; the shortest series bounds the run.
	pub fn run(&mut self, data: &HashMap<Symbol, Vec<(Timestamp, f64)>>) -> Result<PerformanceMetrics, BacktesterError> {
		self.start()?;
		let min_len = data.values().map(Vec::len).min().unwrap_or(0);
		let handle = self.engine.handle();

		for i in 0..min_len {
			for (symbol, rows) in data.iter() {
				let (timestamp, price) = rows[i];
				let ohlcv = replay_core::Ohlcv { open: price, high: price, low: price, close: price, volume: 0.0 };
				let event = Event::market(timestamp, symbol.clone(), MarketData::Ohlcv(ohlcv));
				if !handle.send_event(event) {
					warn!(target: "backtester::run", symbol, "market event dropped, queue rejected send");
				}
			}
			self.drain(Duration::from_secs(5));
		}

		let as_of = data.values().filter_map(|rows| rows.last().map(|(ts, _)| *ts)).max().unwrap_or_else(chrono::Utc::now);
		let metrics = self.summary(as_of);
		self.stop();
		Ok(metrics)
	}

	/// Polls until the engine's ingress queue is empty or `timeout`
	/// elapses; every handler in this crate only ever enqueues further
	/// work from the dispatcher thread itself, so an empty queue means
	/// the whole reaction chain for the current batch has settled.
	fn drain(&self, timeout: Duration) {
		let deadline = Instant::now() + timeout;
		while self.engine.pending_count() > 0 && Instant::now() < deadline {
			std::thread::sleep(Duration::from_millis(2));
		}
	}

	fn register_handlers(&self) {
		self.register_market_handler();
		self.register_signal_handler();
		self.register_order_handler();
		self.register_fill_handler();
	}

	fn register_market_handler(&self) {
		let shared = self.shared.clone();
		let handle = self.engine.handle();
		self.engine.register_event_handler(
			EventType::Market,
			Box::new(move |event| {
				let Event::Market(market) = event else { return };
				let Some(price) = market.data.price() else {
					warn!(target: "backtester::market", symbol = %market.symbol, "market event has no usable price");
					return;
				};

				let mut shared = shared.lock().unwrap();
				shared.portfolio.on_market_price(&market.symbol, price, market.timestamp);

				let mut sink = EngineSink(handle.clone());
				for strategy in shared.strategies.iter_mut() {
					strategy.on_market_data(market, &mut sink);
				}
			}),
		);
	}

	fn register_signal_handler(&self) {
		let shared = self.shared.clone();
		let handle = self.engine.handle();
		self.engine.register_event_handler(
			EventType::Signal,
			Box::new(move |event| {
				let Event::Signal(signal) = event else { return };
				let mut shared = shared.lock().unwrap();

				let Some(price) = shared.portfolio.last_price_of(&signal.symbol) else {
					debug!(target: "backtester::signal", symbol = %signal.symbol, "dropping signal, no known market price");
					return;
				};

				let position = shared.portfolio.position(&signal.symbol);
				let allow_shorting = shared.config.allow_shorting;
				let quantity = match signal.direction {
					Direction::Long => {
						if position < 0.0 {
							position.abs()
						} else {
							let available = shared.portfolio.cash() * signal.strength;
							if available <= 0.0 { 0.0 } else { (available / price).floor() }
						}
					}
					Direction::Short => {
						if position > 0.0 {
							position
						} else if allow_shorting {
							let available = shared.portfolio.cash() * signal.strength;
							if available <= 0.0 { 0.0 } else { (available / price).floor() }
						} else {
							0.0
						}
					}
				};

				if quantity <= 0.0 {
					return;
				}

				let order_id = shared.next_order_id();
				let order = match Event::order(
					signal.timestamp,
					signal.symbol.clone(),
					order_id,
					OrderType::Market,
					quantity,
					signal.direction,
					None,
					None,
				) {
					Ok(order) => order,
					Err(err) => {
						warn!(target: "backtester::signal", error = %err, "failed to build order from signal");
						return;
					}
				};

				if !handle.send_event(order) {
					warn!(target: "backtester::signal", symbol = %signal.symbol, "order event dropped, queue rejected send");
				}
			}),
		);
	}

	fn register_order_handler(&self) {
		let shared = self.shared.clone();
		let handle = self.engine.handle();
		self.engine.register_event_handler(
			EventType::Order,
			Box::new(move |event| {
				let Event::Order(order) = event else { return };
				let mut shared = shared.lock().unwrap();
				shared.portfolio.register_open_order(order.clone());

				if order.order_type != OrderType::Market {
					// Resting order types are left to extension (§4.7); this
					// engine only simulates immediate market execution.
					return;
				}

				let Some(price) = shared.portfolio.last_price_of(&order.symbol) else {
					warn!(target: "backtester::order", symbol = %order.symbol, "no market price to execute against");
					return;
				};

				let slippage = shared.config.slippage;
				let commission_rate = shared.config.commission_rate;
				let exec_price = price * (1.0 + slippage * order.direction.sign());
				let commission = order.quantity * exec_price * commission_rate;

				let fill = match Event::fill(order.timestamp, order.symbol.clone(), order.order_id.clone(), order.quantity, order.direction, exec_price, commission) {
					Ok(fill) => fill,
					Err(err) => {
						warn!(target: "backtester::order", error = %err, "failed to build fill from order");
						return;
					}
				};

				if !handle.send_event(fill) {
					warn!(target: "backtester::order", symbol = %order.symbol, "fill event dropped, queue rejected send");
				}
			}),
		);
	}

	fn register_fill_handler(&self) {
		let shared = self.shared.clone();
		self.engine.register_event_handler(
			EventType::Fill,
			Box::new(move |event| {
				let Event::Fill(fill) = event else { return };
				let mut shared = shared.lock().unwrap();
				shared.portfolio.apply_fill(&fill.order_id, &fill.symbol, fill.direction, fill.quantity, fill.fill_price, fill.commission, fill.timestamp);
				let closed = shared.lots.apply_fill(fill.symbol.clone(), fill.direction, fill.quantity, fill.fill_price, fill.commission, fill.timestamp);
				shared.completed_trades.extend(closed);
			}),
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};

	fn ts(h: u32) -> Timestamp {
		Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
	}

	/// S4: buy-sell round trip. Capital 100000, commission 0.001,
	/// slippage 0, prices [100, 110], signal +1 at bar 0, signal -1 at bar 1.
	#[test]
	fn s4_buy_sell_round_trip_matches_expected_cash_and_position() {
		let mut bt = EventDrivenBacktester::new(BacktesterConfig {
			initial_capital: 100_000.0,
			commission_rate: 0.001,
			slippage: 0.0,
			allow_shorting: false,
		})
		.unwrap();
		bt.start().unwrap();
		let handle = bt.handle();

		let bar = |h: u32, price: f64| Event::market(ts(h), "X", MarketData::Ohlcv(replay_core::Ohlcv { open: price, high: price, low: price, close: price, volume: 0.0 }));

		assert!(handle.send_event(bar(0, 100.0)));
		bt.drain(Duration::from_secs(2));
		assert!(handle.send_event(Event::signal(ts(0), "X", Direction::Long, 1.0).unwrap()));
		bt.drain(Duration::from_secs(2));

		assert!(handle.send_event(bar(1, 110.0)));
		bt.drain(Duration::from_secs(2));
		assert!(handle.send_event(Event::signal(ts(1), "X", Direction::Short, 1.0).unwrap()));
		bt.drain(Duration::from_secs(2));

		bt.stop();

		assert_eq!(bt.position("X"), 0.0);
		assert_eq!(bt.transaction_count(), 2);
		let expected_cash = 100_000.0 - 100.0 * 1000.0 - 100.0 + 110.0 * 1000.0 - 110.0;
		assert!((bt.cash() - expected_cash).abs() < 1e-6);
	}

	/// I4: the equity invariant (cash + mark-to-market positions) holds
	/// after every market event observed.
	#[test]
	fn i4_equity_invariant_holds_after_market_events() {
		let mut bt = EventDrivenBacktester::new(BacktesterConfig::default()).unwrap();
		bt.start().unwrap();
		let handle = bt.handle();

		let bar = |h: u32, price: f64| Event::market(ts(h), "X", MarketData::Ohlcv(replay_core::Ohlcv { open: price, high: price, low: price, close: price, volume: 0.0 }));

		assert!(handle.send_event(bar(0, 100.0)));
		bt.drain(Duration::from_secs(2));
		assert!(handle.send_event(Event::signal(ts(0), "X", Direction::Long, 0.5).unwrap()));
		bt.drain(Duration::from_secs(2));
		assert!(handle.send_event(bar(1, 105.0)));
		bt.drain(Duration::from_secs(2));

		let shared = bt.shared.lock().unwrap();
		let last = shared.portfolio.equity_history().last().unwrap();
		let expected_equity = shared.portfolio.cash() + shared.portfolio.position("X") * shared.portfolio.last_price_of("X").unwrap();
		assert!((last.equity - expected_equity).abs() < 1e-6);
		drop(shared);
		bt.stop();
	}

	#[test]
	fn signal_dropped_when_symbol_price_unknown() {
		let mut bt = EventDrivenBacktester::new(BacktesterConfig::default()).unwrap();
		bt.start().unwrap();
		let handle = bt.handle();
		assert!(handle.send_event(Event::signal(ts(0), "UNKNOWN", Direction::Long, 1.0).unwrap()));
		bt.drain(Duration::from_secs(2));
		assert_eq!(bt.transaction_count(), 0);
		bt.stop();
	}

	/// `run()` (§4.7 Run loop) replays a plain price series without any
	/// attached strategy; no signals are ever emitted, so the run
	/// produces an equity history but no trades.
	#[test]
	fn run_replays_series_and_produces_metrics_without_strategies() {
		let mut bt = EventDrivenBacktester::new(BacktesterConfig::default()).unwrap();
		let mut data = HashMap::new();
		data.insert("X".to_string(), vec![(ts(0), 100.0), (ts(1), 105.0), (ts(2), 103.0)]);

		let metrics = bt.run(&data).unwrap();
		assert_eq!(bt.transaction_count(), 0);
		assert_eq!(metrics.trade_count, 0);
	}
}
