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
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use replay_core::EventType;

/// Per-type processed counts, running time, and sampled queue depth
/// (§3.3). Read concurrently from any thread; updated only by the
/// dispatcher.
pub struct PerformanceCounters {
	started_at: Mutex<Option<Instant>>,
	processed: Mutex<HashMap<EventType, u64>>,
	handler_failures: AtomicU64,
	last_queue_depth: AtomicU64,
}

impl Default for PerformanceCounters {
	fn default() -> Self {
		Self::new()
	}
}

impl PerformanceCounters {
	pub fn new() -> Self {
		Self {
			started_at: Mutex::new(None),
			processed: Mutex::new(HashMap::new()),
			handler_failures: AtomicU64::new(0),
			last_queue_depth: AtomicU64::new(0),
		}
	}

	pub fn mark_started(&self) {
		let mut started = self.started_at.lock().unwrap();
		if started.is_none() {
			*started = Some(Instant::now());
		}
	}

	pub fn record_processed(&self, event_type: EventType) {
		let mut processed = self.processed.lock().unwrap();
		*processed.entry(event_type).or_insert(0) += 1;
	}

	pub fn record_handler_failures(&self, count: usize) {
		self.handler_failures.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn sample_queue_depth(&self, depth: usize) {
		self.last_queue_depth.store(depth as u64, Ordering::Relaxed);
	}

	pub fn processed_count(&self, event_type: EventType) -> u64 {
		*self.processed.lock().unwrap().get(&event_type).unwrap_or(&0)
	}

	pub fn total_processed(&self) -> u64 {
		self.processed.lock().unwrap().values().sum()
	}

	pub fn handler_failure_count(&self) -> u64 {
		self.handler_failures.load(Ordering::Relaxed)
	}

	pub fn queue_depth(&self) -> u64 {
		self.last_queue_depth.load(Ordering::Relaxed)
	}

	pub fn running_time(&self) -> std::time::Duration {
		match *self.started_at.lock().unwrap() {
			Some(start) => start.elapsed(),
			None => std::time::Duration::ZERO,
		}
	}
}
