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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use replay_core::{Event, EventType};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::counters::PerformanceCounters;
use crate::error::EngineError;
use crate::handlers::{Handler, HandlerId, HandlerTable};
use crate::queue::{EventQueue, EventReceiver, EventSender};
use crate::status::{EngineStatus, StatusCell};

const SENTINEL_TAG: &str = "__engine_stop__";

pub(crate) struct GoSignal {
	flag: Mutex<bool>,
	condvar: Condvar,
}

impl GoSignal {
	pub(crate) fn new(initial: bool) -> Self {
		Self { flag: Mutex::new(initial), condvar: Condvar::new() }
	}

	pub(crate) fn set(&self, go: bool) {
		let mut guard = self.flag.lock().unwrap();
		*guard = go;
		if go {
			self.condvar.notify_all();
		}
	}

	pub(crate) fn wait(&self, poll: Duration) -> bool {
		let guard = self.flag.lock().unwrap();
		let (guard, _timeout) = self.condvar.wait_timeout_while(guard, poll, |go| !*go).unwrap();
		*guard
	}
}

/// Joins a worker by polling `is_finished()`, since `JoinHandle::join` has
/// no native timeout.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> Result<(), JoinHandle<()>> {
	let deadline = Instant::now() + timeout;
	loop {
		if handle.is_finished() {
			let _ = handle.join();
			return Ok(());
		}
		if Instant::now() >= deadline {
			return Err(handle);
		}
		thread::sleep(Duration::from_millis(5));
	}
}

/// A cheap, cloneable handle that can submit events to an engine without
/// holding the engine itself. Used to wire producers (e.g. a Replay
/// Engine Manager's per-controller callbacks) that must outlive a
/// borrow of `&EngineManager`.
#[derive(Clone)]
pub struct EngineHandle {
	status: Arc<StatusCell>,
	sender: EventSender,
	send_timeout_ms: u64,
}

impl EngineHandle {
	/// Accepted only when Running or Paused; in Initialized, only Market
	/// events are accepted (a deliberate warm-up path, §4.5/§9).
	pub fn send_event(&self, event: Event) -> bool {
		match self.status.get() {
			EngineStatus::Initialized if event.event_type() != EventType::Market => return false,
			EngineStatus::Initialized | EngineStatus::Running | EngineStatus::Paused => {}
			_ => return false,
		}
		self.sender.send_timeout(event, Duration::from_millis(self.send_timeout_ms))
	}

	pub fn get_status(&self) -> EngineStatus {
		self.status.get()
	}
}

/// Threaded base Event Engine Manager: bounded queue, single dispatcher
/// worker, typed handler table, and the same status-machine shape as the
/// replay controller (§4.5).
pub struct EngineManager {
	status: Arc<StatusCell>,
	go: Arc<GoSignal>,
	stop_flag: Arc<AtomicBool>,
	sender: EventSender,
	receiver: Option<EventReceiver>,
	handlers: Arc<HandlerTable>,
	counters: Arc<PerformanceCounters>,
	config: EngineConfig,
	worker: Option<JoinHandle<()>>,
}

impl EngineManager {
	pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
		config.validate()?;
		let queue = EventQueue::new(config.queue_capacity);
		let (sender, receiver) = queue.split();
		Ok(Self {
			status: Arc::new(StatusCell::new(EngineStatus::Initialized)),
			go: Arc::new(GoSignal::new(false)),
			stop_flag: Arc::new(AtomicBool::new(false)),
			sender,
			receiver: Some(receiver),
			handlers: Arc::new(HandlerTable::new()),
			counters: Arc::new(PerformanceCounters::new()),
			config,
			worker: None,
		})
	}

	pub fn get_status(&self) -> EngineStatus {
		self.status.get()
	}

	pub fn counters(&self) -> &PerformanceCounters {
		&self.counters
	}

	/// Events currently sitting in the queue, awaiting dispatch. Used by
	/// callers (e.g. a batch-mode run loop) that need to wait for the
	/// engine to drain before enqueuing more work.
	pub fn pending_count(&self) -> usize {
		self.sender.len()
	}

	pub fn register_event_handler(&self, event_type: EventType, handler: Handler) -> HandlerId {
		self.handlers.register(event_type, handler)
	}

	pub fn register_wildcard_handler(&self, handler: Handler) -> HandlerId {
		self.handlers.register_wildcard(handler)
	}

	pub fn unregister_event_handler(&self, id: HandlerId) -> bool {
		self.handlers.unregister(id)
	}

	/// A cloneable submitter sharing this engine's queue and status.
	pub fn handle(&self) -> EngineHandle {
		EngineHandle { status: self.status.clone(), sender: self.sender.clone(), send_timeout_ms: self.config.send_timeout_ms }
	}

	/// Accepted only when Running or Paused; in Initialized, only Market
	/// events are accepted (a deliberate warm-up path, §4.5/§9).
	pub fn send_event(&self, event: Event) -> bool {
		self.handle().send_event(event)
	}

	pub fn start(&mut self) -> Result<(), EngineError> {
		let status = self.status.get();
		if matches!(status, EngineStatus::Completed | EngineStatus::Error) {
			return Err(EngineError::InvalidTransition { op: "start", current: status });
		}
		self.status.set(EngineStatus::Running);
		self.go.set(true);
		self.counters.mark_started();

		if self.worker.is_some() {
			return Ok(());
		}
		let receiver = self.receiver.take().expect("engine started twice without a receiver");
		let handlers = self.handlers.clone();
		let counters = self.counters.clone();
		let status_word = self.status.clone();
		let go = self.go.clone();
		let stop_flag = self.stop_flag.clone();
		let batch_size = self.config.dispatch_batch_size;

		let handle = thread::Builder::new()
			.name("event-engine-dispatch".to_string())
			.spawn(move || Self::run_dispatcher(receiver, handlers, counters, status_word, go, stop_flag, batch_size))
			.expect("failed to spawn event engine dispatcher thread");
		self.worker = Some(handle);
		Ok(())
	}

	fn run_dispatcher(
		receiver: EventReceiver,
		handlers: Arc<HandlerTable>,
		counters: Arc<PerformanceCounters>,
		status: Arc<StatusCell>,
		go: Arc<GoSignal>,
		stop_flag: Arc<AtomicBool>,
		batch_size: usize,
	) {
		info!(target: "engine", "dispatcher started");
		'outer: loop {
			if stop_flag.load(Ordering::Relaxed) && receiver.is_empty() {
				break;
			}
			if status.get() == EngineStatus::Paused {
				// Don't drain the queue while paused; wait for resume, but
				// keep re-checking the stop-signal at the top of the loop.
				go.wait(Duration::from_millis(50));
				continue;
			}

			let mut batch = Vec::with_capacity(batch_size);
			match receiver.recv_timeout(Duration::from_millis(50)) {
				Ok(event) => batch.push(event),
				Err(_) => {
					if stop_flag.load(Ordering::Relaxed) && receiver.is_empty() {
						break;
					}
					continue;
				}
			}
			while batch.len() < batch_size {
				match receiver.try_recv() {
					Ok(event) => batch.push(event),
					Err(_) => break,
				}
			}

			for event in batch {
				if let replay_core::Event::Custom(custom) = &event {
					if custom.tag == SENTINEL_TAG {
						break 'outer;
					}
				}
				let failed = handlers.dispatch(&event);
				counters.record_processed(event.event_type());
				if !failed.is_empty() {
					warn!(target: "engine", failed = ?failed, "handler(s) panicked during dispatch");
					counters.record_handler_failures(failed.len());
				}
			}

			if stop_flag.load(Ordering::Relaxed) && receiver.is_empty() {
				break;
			}
		}
		debug!(target: "engine", "dispatcher exited");
	}

	pub fn pause(&self) -> Result<(), EngineError> {
		let status = self.status.get();
		if status != EngineStatus::Running {
			return Err(EngineError::InvalidTransition { op: "pause", current: status });
		}
		self.status.set(EngineStatus::Paused);
		self.go.set(false);
		Ok(())
	}

	pub fn resume(&self) -> Result<(), EngineError> {
		let status = self.status.get();
		if status != EngineStatus::Paused {
			return Err(EngineError::InvalidTransition { op: "resume", current: status });
		}
		self.status.set(EngineStatus::Running);
		self.go.set(true);
		Ok(())
	}

	/// Sets the stop-signal, enqueues a sentinel to unblock the dispatcher,
	/// and joins it with a bounded timeout (§4.5 Lifecycle).
	pub fn stop(&mut self) -> bool {
		if self.status.get().is_terminal() {
			return false;
		}
		self.stop_flag.store(true, Ordering::Relaxed);
		self.status.set(EngineStatus::Stopped);
		self.go.set(true);
		let _ = self.sender.send_timeout(Event::custom(Utc::now(), SENTINEL_TAG, serde_json::Value::Null), Duration::from_millis(100));

		if let Some(handle) = self.worker.take() {
			if join_with_timeout(handle, Duration::from_secs(2)).is_err() {
				warn!(target: "engine", "dispatcher join timed out");
				self.status.set(EngineStatus::Error);
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use replay_core::{MarketData, Ohlcv};
	use std::sync::Mutex as StdMutex;

	fn market_event() -> Event {
		Event::market(Utc::now(), "AAPL", MarketData::Ohlcv(Ohlcv { open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }))
	}

	/// S5: handler observes sent events in send order.
	#[test]
	fn s5_dispatch_preserves_send_order() {
		let mut engine = EngineManager::new(EngineConfig::default()).unwrap();
		let seen = Arc::new(StdMutex::new(Vec::new()));
		let seen_clone = seen.clone();
		engine.register_event_handler(
			EventType::Market,
			Box::new(move |e| seen_clone.lock().unwrap().push(e.timestamp())),
		);
		engine.start().unwrap();

		let e1 = market_event();
		let e2 = market_event();
		let e3 = market_event();
		let order = [e1.timestamp(), e2.timestamp(), e3.timestamp()];
		assert!(engine.send_event(e1));
		assert!(engine.send_event(e2));
		assert!(engine.send_event(e3));

		let deadline = Instant::now() + Duration::from_secs(2);
		while seen.lock().unwrap().len() < 3 && Instant::now() < deadline {
			thread::sleep(Duration::from_millis(10));
		}
		engine.stop();
		assert_eq!(*seen.lock().unwrap(), order);
	}

	/// S6: queue overflow; send_timeout fails after the configured timeout
	/// while paused, and resuming dispatches everything already enqueued.
	#[test]
	fn s6_queue_overflow_then_resume_drains_in_order() {
		let config = EngineConfig { queue_capacity: 4, send_timeout_ms: 50, ..EngineConfig::default() };
		let mut engine = EngineManager::new(config).unwrap();
		let seen = Arc::new(StdMutex::new(Vec::new()));
		let seen_clone = seen.clone();
		engine.register_event_handler(EventType::Market, Box::new(move |_e| seen_clone.lock().unwrap().push(())));

		engine.start().unwrap();
		engine.pause().unwrap();

		for _ in 0..4 {
			assert!(engine.send_event(market_event()));
		}
		let started = Instant::now();
		assert!(!engine.send_event(market_event()));
		assert!(started.elapsed() >= Duration::from_millis(40));

		engine.resume().unwrap();
		let deadline = Instant::now() + Duration::from_secs(2);
		while seen.lock().unwrap().len() < 4 && Instant::now() < deadline {
			thread::sleep(Duration::from_millis(10));
		}
		engine.stop();
		assert_eq!(seen.lock().unwrap().len(), 4);
	}

	#[test]
	fn initialized_rejects_non_market_events() {
		let engine = EngineManager::new(EngineConfig::default()).unwrap();
		let signal = Event::signal(Utc::now(), "AAPL", replay_core::Direction::Long, 0.5).unwrap();
		assert!(!engine.send_event(signal));
		assert!(engine.send_event(market_event()));
	}
}
