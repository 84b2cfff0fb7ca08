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
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use replay_core::{COL_INDEX, COL_SOURCE, COL_TIMESTAMP, CellValue, Row, Timestamp};
use tracing::{debug, info, warn};

use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::pacing::pacing_delay;
use crate::source::TabularSource;
use crate::status::{ReplayStatus, StatusCell};

/// Callback invoked once per emitted row.
pub type Callback = Box<dyn FnMut(&Row) + Send>;
pub type CallbackId = u64;

/// The "go" signal: cleared while Paused, set while Running. Workers wait
/// on this with a short timeout so that stop-signals are still polled even
/// when the controller never resumes (§5 Suspension points).
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

	/// Blocks until the flag is set or `poll` elapses; returns the flag's
	/// value at wake time either way.
	pub(crate) fn wait(&self, poll: Duration) -> bool {
		let guard = self.flag.lock().unwrap();
		let (guard, _timeout) = self
			.condvar
			.wait_timeout_while(guard, poll, |go| !*go)
			.unwrap();
		*guard
	}
}

struct Shared {
	source: Box<dyn TabularSource>,
	position: usize,
	last_timestamp: Option<Timestamp>,
	callbacks: Vec<(CallbackId, Callback)>,
	next_callback_id: CallbackId,
	callback_failures: HashMap<CallbackId, u64>,
	config: ReplayConfig,
}

impl Shared {
	fn new(source: Box<dyn TabularSource>, config: ReplayConfig) -> Self {
		Self {
			source,
			position: 0,
			last_timestamp: None,
			callbacks: Vec::new(),
			next_callback_id: 0,
			callback_failures: HashMap::new(),
			config,
		}
	}

	/// Resolves a row's timestamp: the controller's configured
	/// `timestamp_column` takes priority when set (§6), falling back to
	/// the source's own extraction otherwise.
	fn timestamp_of(&self, row: &Row) -> Option<Timestamp> {
		match self.config.timestamp_column.as_deref() {
			Some(column) => row.get(column).and_then(CellValue::as_timestamp),
			None => self.source.timestamp_of(row),
		}
	}

	/// Fetches and advances past the row at the current position, stamping
	/// the reserved keys (§4.2.1). Returns the row plus the previous and
	/// this row's timestamps, for pacing.
	fn advance(&mut self, name: &str) -> Option<(Row, Option<Timestamp>, Option<Timestamp>)> {
		let idx = self.position;
		let mut row = self.source.row(idx)?;
		let ts = self.timestamp_of(&row);
		row.insert(COL_INDEX.to_string(), CellValue::Int(idx as i64));
		row.insert(COL_SOURCE.to_string(), CellValue::Str(name.to_string()));
		if let Some(ts) = ts {
			row.insert(COL_TIMESTAMP.to_string(), CellValue::Timestamp(ts));
		}
		let prev = self.last_timestamp;
		self.position += 1;
		if ts.is_some() {
			self.last_timestamp = ts;
		}
		Some((row, prev, ts))
	}
}

enum BatchState {
	Direct,
	Batch { sender: Sender<Row>, worker: Option<JoinHandle<()>>, stop: Arc<std::sync::atomic::AtomicBool> },
}

/// Streams rows from a single [`TabularSource`] under a configurable
/// pacing policy (§4.2).
pub struct ReplayController {
	name: String,
	shared: Arc<Mutex<Shared>>,
	status: Arc<StatusCell>,
	go: Arc<GoSignal>,
	worker: Option<JoinHandle<()>>,
	batch: BatchState,
}

impl ReplayController {
	pub fn new(name: impl Into<String>, source: Box<dyn TabularSource>, config: ReplayConfig) -> Self {
		Self {
			name: name.into(),
			shared: Arc::new(Mutex::new(Shared::new(source, config))),
			status: Arc::new(StatusCell::new(ReplayStatus::Initialized)),
			go: Arc::new(GoSignal::new(false)),
			worker: None,
			batch: BatchState::Direct,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn get_status(&self) -> ReplayStatus {
		self.status.get()
	}

	pub fn register_callback(&self, callback: Callback) -> CallbackId {
		let mut shared = self.shared.lock().unwrap();
		let id = shared.next_callback_id;
		shared.next_callback_id += 1;
		shared.callbacks.push((id, callback));
		id
	}

	pub fn unregister_callback(&self, id: CallbackId) -> bool {
		let mut shared = self.shared.lock().unwrap();
		let before = shared.callbacks.len();
		shared.callbacks.retain(|(cid, _)| *cid != id);
		shared.callbacks.len() != before
	}

	pub fn set_mode(&self, mode: crate::pacing::ReplayMode) -> Result<(), ReplayError> {
		if self.status.get() == ReplayStatus::Running {
			return Err(ReplayError::ModeLockedWhileRunning);
		}
		self.shared.lock().unwrap().config.mode = mode;
		Ok(())
	}

	pub fn set_speed(&self, factor: f64) -> Result<(), ReplayError> {
		if factor <= 0.0 {
			return Err(ReplayError::InvalidSpeedFactor(factor));
		}
		self.shared.lock().unwrap().config.speed_factor = factor;
		Ok(())
	}

	/// Starts the controller: transitions to Running, and for worker modes
	/// (Backtest/Realtime/Accelerated) spawns the replay thread (§4.2).
	pub fn start(&mut self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if matches!(status, ReplayStatus::Completed | ReplayStatus::Error) {
			return Err(ReplayError::InvalidTransition { op: "start", current: status });
		}

		let mode = self.shared.lock().unwrap().config.mode;
		self.status.set(ReplayStatus::Running);
		self.go.set(true);

		if mode == crate::pacing::ReplayMode::Stepped {
			// No background worker; step() drives emission on the caller's thread.
			return Ok(());
		}

		if self.worker.is_some() {
			return Ok(());
		}

		self.spawn_batch_worker_if_configured();

		let shared = self.shared.clone();
		let status_word = self.status.clone();
		let go = self.go.clone();
		let name = self.name.clone();
		let batch_sender = match &self.batch {
			BatchState::Batch { sender, .. } => Some(sender.clone()),
			BatchState::Direct => None,
		};

		let handle = thread::Builder::new()
			.name(format!("replay-{name}"))
			.spawn(move || Self::run_worker(shared, status_word, go, name, batch_sender))
			.expect("failed to spawn replay worker thread");
		self.worker = Some(handle);
		Ok(())
	}

	fn spawn_batch_worker_if_configured(&mut self) {
		let batch_callbacks = self.shared.lock().unwrap().config.batch_callbacks;
		if !batch_callbacks || matches!(self.batch, BatchState::Batch { .. }) {
			return;
		}
		let capacity = self.shared.lock().unwrap().config.callback_queue_capacity;
		let (tx, rx) = channel::bounded::<Row>(capacity);
		let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
		let shared = self.shared.clone();
		let stop_clone = stop.clone();
		let name = self.name.clone();
		let worker = thread::Builder::new()
			.name(format!("replay-callbacks-{name}"))
			.spawn(move || Self::run_callback_worker(rx, shared, stop_clone))
			.expect("failed to spawn callback worker thread");
		self.batch = BatchState::Batch { sender: tx, worker: Some(worker), stop };
	}

	fn run_callback_worker(rx: Receiver<Row>, shared: Arc<Mutex<Shared>>, stop: Arc<std::sync::atomic::AtomicBool>) {
		loop {
			match rx.recv_timeout(Duration::from_millis(100)) {
				Ok(row) => Self::dispatch(&shared, &row),
				Err(channel::RecvTimeoutError::Timeout) => {
					if stop.load(std::sync::atomic::Ordering::Relaxed) {
						break;
					}
				}
				Err(channel::RecvTimeoutError::Disconnected) => break,
			}
		}
		// Best-effort drain within a short grace period (§4.2.3).
		let deadline = Instant::now() + Duration::from_millis(200);
		while Instant::now() < deadline {
			match rx.try_recv() {
				Ok(row) => Self::dispatch(&shared, &row),
				Err(_) => break,
			}
		}
	}

	fn run_worker(
		shared: Arc<Mutex<Shared>>,
		status: Arc<StatusCell>,
		go: Arc<GoSignal>,
		name: String,
		batch_sender: Option<Sender<Row>>,
	) {
		info!(target: "replay", source = %name, "replay worker started");
		loop {
			if !go.wait(Duration::from_millis(100)) {
				if status.get().is_terminal() {
					break;
				}
				continue;
			}
			if status.get() != ReplayStatus::Running {
				break;
			}

			let (row, prev_ts, next_ts, mode, speed_factor) = {
				let mut guard = shared.lock().unwrap();
				let mode = guard.config.mode;
				let speed_factor = guard.config.speed_factor;
				match guard.advance(&name) {
					Some((row, prev, next)) => (Some(row), prev, next, mode, speed_factor),
					None => (None, None, None, mode, speed_factor),
				}
			};

			let Some(row) = row else {
				status.set(ReplayStatus::Completed);
				info!(target: "replay", source = %name, "replay completed: source exhausted");
				break;
			};

			let delay = pacing_delay(mode, speed_factor, prev_ts, next_ts);
			if !delay.is_zero() {
				thread::sleep(delay);
			}

			match &batch_sender {
				Some(sender) => {
					if sender.send(row).is_err() {
						warn!(target: "replay", source = %name, "callback queue disconnected");
					}
				}
				None => Self::dispatch(&shared, &row),
			}

			if mode == crate::pacing::ReplayMode::Stepped {
				status.set(ReplayStatus::Paused);
				go.set(false);
			}
		}
		debug!(target: "replay", source = %name, "replay worker exited");
	}

	/// Invokes every registered callback with `row`, in registration order.
	/// The callback list is swapped out of the lock for the duration of
	/// dispatch so the lock is never held across user code (§5).
	fn dispatch(shared: &Arc<Mutex<Shared>>, row: &Row) {
		let mut callbacks = {
			let mut guard = shared.lock().unwrap();
			std::mem::take(&mut guard.callbacks)
		};

		let mut failed: Vec<CallbackId> = Vec::new();
		for (id, callback) in callbacks.iter_mut() {
			let result = catch_unwind(AssertUnwindSafe(|| callback(row)));
			if result.is_err() {
				failed.push(*id);
				warn!(target: "replay", callback_id = id, "callback panicked; continuing dispatch");
			}
		}

		let mut guard = shared.lock().unwrap();
		guard.callbacks = callbacks;
		for id in failed {
			*guard.callback_failures.entry(id).or_insert(0) += 1;
		}
	}

	/// Advances exactly one row on the caller's thread; no worker involved.
	pub fn step_sync(&self) -> Option<Row> {
		let row = {
			let mut guard = self.shared.lock().unwrap();
			guard.advance(&self.name).map(|(row, _, _)| row)
		};
		match &row {
			Some(row) => {
				Self::dispatch(&self.shared, row);
				if self.shared.lock().unwrap().config.mode == crate::pacing::ReplayMode::Stepped {
					self.status.set(ReplayStatus::Paused);
					self.go.set(false);
				}
			}
			None => self.status.set(ReplayStatus::Completed),
		}
		row
	}

	/// Advances exactly one row, auto-starting from Initialized first.
	pub fn step(&mut self) -> Option<Row> {
		if self.status.get() == ReplayStatus::Initialized {
			let _ = self.start();
		}
		self.step_sync()
	}

	pub fn pause(&self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if status != ReplayStatus::Running {
			return Err(ReplayError::InvalidTransition { op: "pause", current: status });
		}
		self.status.set(ReplayStatus::Paused);
		self.go.set(false);
		Ok(())
	}

	pub fn resume(&self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if status != ReplayStatus::Paused {
			return Err(ReplayError::InvalidTransition { op: "resume", current: status });
		}
		self.status.set(ReplayStatus::Running);
		self.go.set(true);
		Ok(())
	}

	/// Stops the controller. Idempotent when already terminal (returns
	/// `false` in that case); joins the worker(s) with a bounded timeout.
	pub fn stop(&mut self) -> bool {
		if self.status.get().is_terminal() {
			return false;
		}
		self.status.set(ReplayStatus::Stopped);
		self.go.set(true); // wake a parked worker so it observes the new status promptly

		if let Some(handle) = self.worker.take() {
			if join_with_timeout(handle, Duration::from_secs(2)).is_err() {
				warn!(target: "replay", source = %self.name, "worker join timed out");
				self.status.set(ReplayStatus::Error);
			}
		}
		if let BatchState::Batch { worker, stop, .. } = &mut self.batch {
			stop.store(true, std::sync::atomic::Ordering::Relaxed);
			if let Some(handle) = worker.take() {
				let _ = join_with_timeout(handle, Duration::from_secs(2));
			}
		}
		true
	}

	/// Rebuilds the controller to its just-constructed state (§4.2.4).
	/// Rejected while Running; the callback table is left untouched.
	pub fn reset(&mut self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if status == ReplayStatus::Running {
			return Err(ReplayError::InvalidTransition { op: "reset", current: status });
		}
		if let Some(handle) = self.worker.take() {
			let _ = join_with_timeout(handle, Duration::from_secs(2));
		}
		self.batch = BatchState::Direct;

		let mut guard = self.shared.lock().unwrap();
		guard.position = 0;
		guard.last_timestamp = None;
		self.status.set(ReplayStatus::Initialized);
		self.go.set(false);
		Ok(())
	}

	/// Iterates the source to completion on the caller's thread, invoking
	/// every callback directly and returning the full emitted sequence.
	pub fn process_all_sync(&self) -> Vec<Row> {
		let mut out = Vec::new();
		loop {
			let advanced = {
				let mut guard = self.shared.lock().unwrap();
				guard.advance(&self.name)
			};
			match advanced {
				Some((row, prev, next)) => {
					let mode = self.shared.lock().unwrap().config.mode;
					let speed_factor = self.shared.lock().unwrap().config.speed_factor;
					let delay = pacing_delay(mode, speed_factor, prev, next);
					if !delay.is_zero() {
						thread::sleep(delay);
					}
					Self::dispatch(&self.shared, &row);
					out.push(row);
				}
				None => break,
			}
		}
		self.status.set(ReplayStatus::Completed);
		out
	}
}

/// Joins a worker, polling `is_finished()` instead of blocking forever,
/// since `JoinHandle::join` has no native timeout.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> Result<(), JoinHandle<()>> {
	let deadline = Instant::now() + timeout;
	let mut handle = handle;
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ReplayConfig;
	use crate::pacing::ReplayMode;
	use crate::source::InMemoryTable;
	use chrono::{TimeZone, Utc};
	use replay_core::CellValue;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn row(ts_secs: i64, close: f64) -> Row {
		let mut r = Row::new();
		r.insert("ts".to_string(), CellValue::Timestamp(Utc.timestamp_opt(ts_secs, 0).unwrap()));
		r.insert("close".to_string(), CellValue::Float(close));
		r
	}

	fn table(n: usize) -> InMemoryTable {
		let rows: Vec<Row> = (0..n as i64).map(|i| row(i, 100.0 + i as f64)).collect();
		InMemoryTable::new(vec!["ts".into(), "close".into()], rows).with_timestamp_column("ts")
	}

	#[test]
	fn process_all_sync_preserves_order_and_length() {
		let controller = ReplayController::new("default", Box::new(table(3)), ReplayConfig::default());
		let rows = controller.process_all_sync();
		assert_eq!(rows.len(), 3);
		for (i, row) in rows.iter().enumerate() {
			assert_eq!(row.get("index").unwrap().as_f64(), Some(i as f64));
			assert_eq!(row.get("_source").unwrap().as_str(), Some("default"));
		}
		assert_eq!(controller.get_status(), ReplayStatus::Completed);
	}

	#[test]
	fn empty_source_completes_immediately() {
		let controller = ReplayController::new("default", Box::new(table(0)), ReplayConfig::default());
		let rows = controller.process_all_sync();
		assert!(rows.is_empty());
		assert_eq!(controller.get_status(), ReplayStatus::Completed);
	}

	#[test]
	fn stepped_mode_pauses_after_each_row() {
		let mut config = ReplayConfig::default();
		config.mode = ReplayMode::Stepped;
		let mut controller = ReplayController::new("default", Box::new(table(5)), config);

		for _ in 0..3 {
			let row = controller.step();
			assert!(row.is_some());
			assert_eq!(controller.get_status(), ReplayStatus::Paused);
		}
		assert!(controller.stop());
		assert_eq!(controller.get_status(), ReplayStatus::Stopped);
	}

	#[test]
	fn reset_restores_initial_state() {
		let controller1 = ReplayController::new("default", Box::new(table(3)), ReplayConfig::default());
		let first = controller1.process_all_sync();

		let mut controller2 = ReplayController::new("default", Box::new(table(3)), ReplayConfig::default());
		let _ = controller2.process_all_sync();
		controller2.reset().unwrap();
		assert_eq!(controller2.get_status(), ReplayStatus::Initialized);
		let second = controller2.process_all_sync();
		assert_eq!(first, second);
	}

	#[test]
	fn callback_panic_does_not_stop_other_callbacks() {
		let controller = ReplayController::new("default", Box::new(table(1)), ReplayConfig::default());
		let count = Arc::new(AtomicUsize::new(0));
		let count_clone = count.clone();
		controller.register_callback(Box::new(|_row: &Row| panic!("boom")));
		controller.register_callback(Box::new(move |_row: &Row| {
			count_clone.fetch_add(1, Ordering::SeqCst);
		}));
		let rows = controller.process_all_sync();
		assert_eq!(rows.len(), 1);
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn configured_timestamp_column_overrides_source_default() {
		let mut r = Row::new();
		r.insert("ts".to_string(), CellValue::Timestamp(Utc.timestamp_opt(0, 0).unwrap()));
		r.insert("alt_ts".to_string(), CellValue::Timestamp(Utc.timestamp_opt(99, 0).unwrap()));
		r.insert("close".to_string(), CellValue::Float(1.0));
		let source = InMemoryTable::new(vec!["ts".into(), "alt_ts".into(), "close".into()], vec![r]);

		let mut config = ReplayConfig::default();
		config.timestamp_column = Some("alt_ts".to_string());
		let controller = ReplayController::new("default", Box::new(source), config);

		let rows = controller.process_all_sync();
		assert_eq!(rows[0].get("_timestamp").unwrap().as_timestamp(), Some(Utc.timestamp_opt(99, 0).unwrap()));
	}

	#[test]
	fn stop_is_idempotent_on_terminal_state() {
		let mut controller = ReplayController::new("default", Box::new(table(1)), ReplayConfig::default());
		let _ = controller.process_all_sync();
		assert!(!controller.stop());
	}
}
