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

use std::cmp::Ordering;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use replay_core::{COL_INDEX, COL_SOURCE, COL_TIMESTAMP, CellValue, Row, Timestamp};
use tracing::{info, warn};

use crate::config::MultiReplayConfig;
use crate::controller::{Callback, CallbackId, GoSignal, join_with_timeout};
use crate::error::ReplayError;
use crate::pacing::pacing_delay;
use crate::source::TabularSource;
use crate::status::{ReplayStatus, StatusCell};

type Extractor = Box<dyn Fn(&Row) -> Option<Timestamp> + Send>;

struct SourceSlot {
	name: String,
	source: Box<dyn TabularSource>,
	position: usize,
	finished: bool,
	extractor: Option<Extractor>,
	registration_index: usize,
}

impl SourceSlot {
	/// Uses the registered extractor if one was given at `add_source_with_extractor`;
	/// otherwise defers to the source's own `timestamp_of`, falling back to the
	/// row's `index` column if that still comes up empty (§4.4 Open Question 2).
	fn timestamp_of(&self, row: &Row) -> Option<Timestamp> {
		match &self.extractor {
			Some(f) => f(row),
			None => self.source.timestamp_of(row).or_else(|| row.get(COL_INDEX).and_then(CellValue::as_timestamp)),
		}
	}
}

struct Candidate {
	slot_index: usize,
	row: Row,
	ts: Option<Timestamp>,
}

/// Orders candidates so the smallest-timestamp row wins; a known timestamp
/// always beats an unknown one, ties among known timestamps break on
/// source name (lexicographic, per §4.4), and ties among unknown
/// timestamps break on registration order.
fn candidate_rank(a: &Candidate, a_name: &str, a_reg: usize, b: &Candidate, b_name: &str, b_reg: usize) -> Ordering {
	match (a.ts, b.ts) {
		(Some(ta), Some(tb)) => ta.cmp(&tb).then_with(|| a_name.cmp(b_name)),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => a_reg.cmp(&b_reg),
	}
}

struct Shared {
	slots: Vec<SourceSlot>,
	callbacks: Vec<(CallbackId, Callback)>,
	next_callback_id: CallbackId,
	last_timestamp: Option<Timestamp>,
	config: MultiReplayConfig,
}

impl Shared {
	fn all_finished(&self) -> bool {
		self.slots.iter().all(|s| s.finished)
	}

	/// Picks the winning candidate among non-finished slots, emits it
	/// (stamped with its source name), and advances that slot's cursor.
	fn advance(&mut self) -> Option<(Row, Option<Timestamp>, Option<Timestamp>)> {
		let mut best: Option<Candidate> = None;
		for (i, slot) in self.slots.iter().enumerate() {
			if slot.finished {
				continue;
			}
			let Some(row) = slot.source.row(slot.position) else {
				continue;
			};
			let ts = slot.timestamp_of(&row);
			let candidate = Candidate { slot_index: i, row, ts };
			best = match best {
				None => Some(candidate),
				Some(current) => {
					let current_slot = &self.slots[current.slot_index];
					let candidate_slot = &self.slots[candidate.slot_index];
					let ord = candidate_rank(
						&candidate,
						&candidate_slot.name,
						candidate_slot.registration_index,
						&current,
						&current_slot.name,
						current_slot.registration_index,
					);
					if ord == Ordering::Less { Some(candidate) } else { Some(current) }
				}
			};
		}

		let candidate = best?;
		let slot = &mut self.slots[candidate.slot_index];
		let idx = slot.position;
		let mut row = candidate.row;
		row.insert(COL_INDEX.to_string(), CellValue::Int(idx as i64));
		row.insert(COL_SOURCE.to_string(), CellValue::Str(slot.name.clone()));
		if let Some(ts) = candidate.ts {
			row.insert(COL_TIMESTAMP.to_string(), CellValue::Timestamp(ts));
		}
		slot.position += 1;
		if slot.source.row(slot.position).is_none() {
			slot.finished = true;
		}

		let prev = self.last_timestamp;
		if candidate.ts.is_some() {
			self.last_timestamp = candidate.ts;
		}
		Some((row, prev, candidate.ts))
	}
}

/// Merges N time-indexed sources into a single time-ordered stream (§4.4).
pub struct MultiReplayController {
	shared: Arc<Mutex<Shared>>,
	status: Arc<StatusCell>,
	go: Arc<GoSignal>,
	worker: Option<JoinHandle<()>>,
}

impl MultiReplayController {
	pub fn new(config: MultiReplayConfig) -> Self {
		Self {
			shared: Arc::new(Mutex::new(Shared {
				slots: Vec::new(),
				callbacks: Vec::new(),
				next_callback_id: 0,
				last_timestamp: None,
				config,
			})),
			status: Arc::new(StatusCell::new(ReplayStatus::Initialized)),
			go: Arc::new(GoSignal::new(false)),
			worker: None,
		}
	}

	/// Registers a source under `name`. Only valid while Initialized.
	pub fn add_source(&mut self, name: impl Into<String>, source: Box<dyn TabularSource>) -> Result<(), ReplayError> {
		self.add_source_with_extractor(name, source, None)
	}

	pub fn add_source_with_extractor(
		&mut self,
		name: impl Into<String>,
		source: Box<dyn TabularSource>,
		extractor: Option<Extractor>,
	) -> Result<(), ReplayError> {
		let status = self.status.get();
		if status != ReplayStatus::Initialized {
			return Err(ReplayError::InvalidTransition { op: "add_source", current: status });
		}
		let mut shared = self.shared.lock().unwrap();
		let registration_index = shared.slots.len();
		shared.slots.push(SourceSlot {
			name: name.into(),
			source,
			position: 0,
			finished: false,
			extractor,
			registration_index,
		});
		Ok(())
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

	fn dispatch(shared: &Arc<Mutex<Shared>>, row: &Row) {
		let mut callbacks = {
			let mut guard = shared.lock().unwrap();
			std::mem::take(&mut guard.callbacks)
		};
		for (id, callback) in callbacks.iter_mut() {
			if catch_unwind(AssertUnwindSafe(|| callback(row))).is_err() {
				warn!(target: "replay::multi", callback_id = id, "callback panicked; continuing dispatch");
			}
		}
		shared.lock().unwrap().callbacks = callbacks;
	}

	pub fn start(&mut self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if matches!(status, ReplayStatus::Completed | ReplayStatus::Error) {
			return Err(ReplayError::InvalidTransition { op: "start", current: status });
		}
		self.status.set(ReplayStatus::Running);
		self.go.set(true);
		if self.worker.is_some() {
			return Ok(());
		}

		let shared = self.shared.clone();
		let status_word = self.status.clone();
		let go = self.go.clone();
		let handle = thread::Builder::new()
			.name("replay-multi".to_string())
			.spawn(move || Self::run_worker(shared, status_word, go))
			.expect("failed to spawn multi-replay worker thread");
		self.worker = Some(handle);
		Ok(())
	}

	fn run_worker(shared: Arc<Mutex<Shared>>, status: Arc<StatusCell>, go: Arc<GoSignal>) {
		info!(target: "replay::multi", "multi-source replay worker started");
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

			let (advanced, mode, speed_factor) = {
				let mut guard = shared.lock().unwrap();
				let mode = guard.config.mode;
				let speed_factor = guard.config.speed_factor;
				(guard.advance(), mode, speed_factor)
			};

			let Some((row, prev_ts, next_ts)) = advanced else {
				status.set(ReplayStatus::Completed);
				info!(target: "replay::multi", "multi-source replay completed");
				break;
			};

			let delay = pacing_delay(mode, speed_factor, prev_ts, next_ts);
			if !delay.is_zero() {
				thread::sleep(delay);
			}
			Self::dispatch(&shared, &row);
		}
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

	pub fn stop(&mut self) -> bool {
		if self.status.get().is_terminal() {
			return false;
		}
		self.status.set(ReplayStatus::Stopped);
		self.go.set(true);
		if let Some(handle) = self.worker.take() {
			if join_with_timeout(handle, Duration::from_secs(2)).is_err() {
				self.status.set(ReplayStatus::Error);
			}
		}
		true
	}

	pub fn reset(&mut self) -> Result<(), ReplayError> {
		let status = self.status.get();
		if status == ReplayStatus::Running {
			return Err(ReplayError::InvalidTransition { op: "reset", current: status });
		}
		if let Some(handle) = self.worker.take() {
			let _ = join_with_timeout(handle, Duration::from_secs(2));
		}
		let mut guard = self.shared.lock().unwrap();
		for slot in guard.slots.iter_mut() {
			slot.position = 0;
			slot.finished = false;
		}
		guard.last_timestamp = None;
		drop(guard);
		self.status.set(ReplayStatus::Initialized);
		self.go.set(false);
		Ok(())
	}

	/// Iterates every source to completion on the caller's thread (§8 I2).
	pub fn process_all_sync(&self) -> Vec<Row> {
		let mut out = Vec::new();
		loop {
			let (advanced, mode, speed_factor) = {
				let mut guard = self.shared.lock().unwrap();
				let mode = guard.config.mode;
				let speed_factor = guard.config.speed_factor;
				(guard.advance(), mode, speed_factor)
			};
			match advanced {
				Some((row, prev, next)) => {
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::InMemoryTable;
	use chrono::{TimeZone, Utc};

	fn row(ts_secs: i64, v: &str) -> Row {
		let mut r = Row::new();
		r.insert("ts".to_string(), CellValue::Timestamp(Utc.timestamp_opt(ts_secs, 0).unwrap()));
		r.insert("v".to_string(), CellValue::Str(v.to_string()));
		r
	}

	/// No `ts` column and no `index` column: unresolvable by either the
	/// configured-column path or the index-column fallback.
	fn untimestamped_row(v: &str) -> Row {
		let mut r = Row::new();
		r.insert("v".to_string(), CellValue::Str(v.to_string()));
		r
	}

	#[test]
	fn two_source_merge_orders_by_timestamp() {
		let a = InMemoryTable::new(vec!["ts".into(), "v".into()], vec![row(1, "A1"), row(3, "A2")])
			.with_timestamp_column("ts");
		let b = InMemoryTable::new(vec!["ts".into(), "v".into()], vec![row(2, "B1"), row(4, "B2")])
			.with_timestamp_column("ts");

		let mut controller = MultiReplayController::new(MultiReplayConfig::default());
		controller.add_source("A", Box::new(a)).unwrap();
		controller.add_source("B", Box::new(b)).unwrap();

		let rows = controller.process_all_sync();
		let values: Vec<String> = rows.iter().map(|r| r.get("v").unwrap().as_str().unwrap().to_string()).collect();
		assert_eq!(values, vec!["A1", "B1", "A2", "B2"]);
		for r in &rows {
			assert!(r.contains_key("_source"));
		}
	}

	/// One source is fully timestamped, the other has no extractable
	/// timestamp at all: known timestamps must always win, and once the
	/// timestamped source is drained the untimestamped rows fall out in
	/// their own registration order (§4.4 Open Question 2).
	#[test]
	fn mixed_timestamped_and_untimestamped_sources_resolve_by_fallback_chain() {
		let a = InMemoryTable::new(vec!["ts".into(), "v".into()], vec![row(1, "A1"), row(2, "A2")])
			.with_timestamp_column("ts");
		let b = InMemoryTable::new(vec!["v".into()], vec![untimestamped_row("B1"), untimestamped_row("B2")]);

		let mut controller = MultiReplayController::new(MultiReplayConfig::default());
		controller.add_source("A", Box::new(a)).unwrap();
		controller.add_source("B", Box::new(b)).unwrap();

		let rows = controller.process_all_sync();
		let values: Vec<String> = rows.iter().map(|r| r.get("v").unwrap().as_str().unwrap().to_string()).collect();
		assert_eq!(values, vec!["A1", "A2", "B1", "B2"]);
		assert!(rows[0].contains_key("_timestamp"));
		assert!(rows[1].contains_key("_timestamp"));
		assert!(!rows[2].contains_key("_timestamp"));
		assert!(!rows[3].contains_key("_timestamp"));
	}

	#[test]
	fn completes_when_all_sources_exhausted() {
		let a = InMemoryTable::new(vec!["ts".into()], vec![]);
		let mut controller = MultiReplayController::new(MultiReplayConfig::default());
		controller.add_source("A", Box::new(a)).unwrap();
		let rows = controller.process_all_sync();
		assert!(rows.is_empty());
		assert_eq!(controller.get_status(), ReplayStatus::Completed);
	}
}
