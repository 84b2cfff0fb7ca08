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

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle status, shared in shape between the replay controller and the
/// engine manager (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplayStatus {
	Initialized = 0,
	Running = 1,
	Paused = 2,
	Stopped = 3,
	Completed = 4,
	Error = 5,
}

impl ReplayStatus {
	fn from_u8(v: u8) -> Self {
		match v {
			0 => ReplayStatus::Initialized,
			1 => ReplayStatus::Running,
			2 => ReplayStatus::Paused,
			3 => ReplayStatus::Stopped,
			4 => ReplayStatus::Completed,
			_ => ReplayStatus::Error,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, ReplayStatus::Stopped | ReplayStatus::Completed | ReplayStatus::Error)
	}

	pub fn is_live(self) -> bool {
		!self.is_terminal()
	}
}

/// An atomic status word plus the "go" flag that gates the worker loop.
///
/// The Python original used a threading.Event as the go-signal and a
/// separate status string under the same lock; here the status is a
/// lock-free atomic (read constantly by the worker) and the go-signal is
/// the Condvar pair in `controller.rs` that the worker actually blocks on.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
	pub fn new(initial: ReplayStatus) -> Self {
		Self(AtomicU8::new(initial as u8))
	}

	pub fn get(&self) -> ReplayStatus {
		ReplayStatus::from_u8(self.0.load(Ordering::SeqCst))
	}

	pub fn set(&self, status: ReplayStatus) {
		self.0.store(status as u8, Ordering::SeqCst);
	}
}
