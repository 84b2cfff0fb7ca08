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

use std::collections::HashMap;

use chrono::Utc;
use replay_controller::{CallbackId, ReplayController, ReplayStatus};
use replay_core::{Event, MarketData, Row, Timestamp};
use tracing::warn;

use crate::error::EngineError;
use crate::manager::EngineManager;

/// Converts a replayed row into an `Event`. Returning `None` drops the
/// row rather than enqueuing anything (§4.6 step 3).
pub type DataConverter = Box<dyn Fn(&Row, Timestamp, &str) -> Option<Event> + Send>;

struct Binding {
	controller: ReplayController,
	symbol_override: Option<String>,
	converter: Option<DataConverter>,
	callback_id: Option<CallbackId>,
}

/// Binds M replay controllers to one [`EngineManager`], converting each
/// emitted row into a `Market` event (or a caller-supplied conversion)
/// carrying its source tag (§4.6).
pub struct ReplayEngineManager {
	engine: EngineManager,
	bindings: HashMap<String, Binding>,
}

impl ReplayEngineManager {
	pub fn new(engine: EngineManager) -> Self {
		Self { engine, bindings: HashMap::new() }
	}

	pub fn engine(&self) -> &EngineManager {
		&self.engine
	}

	pub fn engine_mut(&mut self) -> &mut EngineManager {
		&mut self.engine
	}

	pub fn add_controller(
		&mut self,
		name: impl Into<String>,
		controller: ReplayController,
		symbol_override: Option<String>,
		converter: Option<DataConverter>,
	) {
		self.bindings.insert(name.into(), Binding { controller, symbol_override, converter, callback_id: None });
	}

	/// Determines the event's symbol: the binding's override, else the
	/// row's `symbol` column, else the controller's own name (§4.6 step 1).
	fn resolve_symbol(row: &Row, source: &str, symbol_override: &Option<String>) -> String {
		if let Some(symbol) = symbol_override {
			return symbol.clone();
		}
		row.get("symbol").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| source.to_string())
	}

	/// Determines the event's timestamp: `timestamp`/`time`/`date` columns
	/// if present, else the current wall clock as a last resort (§4.6 step 2).
	fn resolve_timestamp(row: &Row) -> Timestamp {
		for key in ["timestamp", "time", "date"] {
			if let Some(ts) = row.get(key).and_then(|v| v.as_timestamp()) {
				return ts;
			}
		}
		Utc::now()
	}

	fn on_replay_data(
		source: &str,
		row: &Row,
		symbol_override: &Option<String>,
		converter: &Option<DataConverter>,
		handle: &crate::manager::EngineHandle,
	) {
		let symbol = Self::resolve_symbol(row, source, symbol_override);
		let timestamp = Self::resolve_timestamp(row);

		let event = match converter {
			Some(convert) => match convert(row, timestamp, &symbol) {
				Some(event) => event.with_source(source.to_string()),
				None => return,
			},
			None => Event::market(timestamp, symbol, MarketData::Fields(row.clone())).with_source(source.to_string()),
		};

		if !handle.send_event(event) {
			warn!(target: "engine::replay", source, "send_event failed (queue full or engine not accepting)");
		}
	}

	/// (a) validates the base engine can start, (b) wires each controller's
	/// callback (capturing its name by value — the source's "shared
	/// closure" bug this crate deliberately avoids, §9), (c) registers it,
	/// (d) starts every controller not already Running.
	pub fn start(&mut self) -> Result<(), EngineError> {
		self.engine.start()?;

		for (name, binding) in self.bindings.iter_mut() {
			let source_name = name.clone();
			let symbol_override = binding.symbol_override.clone();
			let handle = self.engine.handle();
			// `converter` cannot be moved into an `FnMut` closure while
			// still being read by `on_replay_data`'s signature, so we take
			// it out of the binding for the closure's lifetime instead.
			let converter = binding.converter.take();
			let callback: replay_controller::Callback = Box::new(move |row: &Row| {
				Self::on_replay_data(&source_name, row, &symbol_override, &converter, &handle);
			});
			let id = binding.controller.register_callback(callback);
			binding.callback_id = Some(id);

			if binding.controller.get_status() != ReplayStatus::Running {
				let _ = binding.controller.start();
			}
		}
		Ok(())
	}

	/// Pauses producers before consumers: controllers then engine.
	pub fn pause(&mut self) -> Result<(), EngineError> {
		for binding in self.bindings.values() {
			let _ = binding.controller.pause();
		}
		self.engine.pause()
	}

	/// Resumes consumers before producers: engine then controllers.
	pub fn resume(&mut self) -> Result<(), EngineError> {
		self.engine.resume()?;
		for binding in self.bindings.values() {
			let _ = binding.controller.resume();
		}
		Ok(())
	}

	/// Stops controllers first, then the engine, unregistering each
	/// controller's callback before the controller handle is released.
	pub fn stop(&mut self) -> bool {
		for binding in self.bindings.values_mut() {
			binding.controller.stop();
			if let Some(id) = binding.callback_id.take() {
				binding.controller.unregister_callback(id);
			}
		}
		self.engine.stop()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::EngineConfig;
	use replay_controller::{InMemoryTable, ReplayConfig};
	use replay_core::{CellValue, EventType};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex};
	use std::time::{Duration, Instant};

	fn row(close: f64) -> Row {
		let mut r = Row::new();
		r.insert("close".to_string(), CellValue::Float(close));
		r
	}

	#[test]
	fn multiple_controllers_each_tag_their_own_source_name() {
		let mut manager = ReplayEngineManager::new(EngineManager::new(EngineConfig::default()).unwrap());

		let seen_sources = Arc::new(Mutex::new(Vec::new()));
		let count = Arc::new(AtomicUsize::new(0));

		for src in ["feed_a", "feed_b", "feed_c"] {
			let table = InMemoryTable::new(vec!["close".into()], vec![row(1.0), row(2.0)]);
			let controller = ReplayController::new(src, Box::new(table), ReplayConfig::default());
			manager.add_controller(src, controller, None, None);
		}

		let seen_clone = seen_sources.clone();
		let count_clone = count.clone();
		manager.engine().register_event_handler(
			EventType::Market,
			Box::new(move |e| {
				if let Event::Market(m) = e {
					seen_clone.lock().unwrap().push(m.source.clone().unwrap_or_default());
				}
				count_clone.fetch_add(1, Ordering::SeqCst);
			}),
		);

		manager.start().unwrap();

		let deadline = Instant::now() + Duration::from_secs(2);
		while count.load(Ordering::SeqCst) < 6 && Instant::now() < deadline {
			std::thread::sleep(Duration::from_millis(10));
		}
		manager.stop();

		let sources = seen_sources.lock().unwrap();
		assert_eq!(sources.len(), 6);
		// Each controller's own name must appear, not a single shared name
		// (the closure-capture-by-reference bug this design avoids, §9).
		for src in ["feed_a", "feed_b", "feed_c"] {
			assert_eq!(sources.iter().filter(|s| s.as_str() == src).count(), 2);
		}
	}
}
