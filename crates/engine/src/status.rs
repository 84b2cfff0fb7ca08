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

/// Lifecycle status, identical in shape to the replay controller's (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineStatus {
	Initialized = 0,
	Running = 1,
	Paused = 2,
	Stopped = 3,
	Completed = 4,
	Error = 5,
}

impl EngineStatus {
	fn from_u8(v: u8) -> Self {
		match v {
			0 => EngineStatus::Initialized,
			1 => EngineStatus::Running,
			2 => EngineStatus::Paused,
			3 => EngineStatus::Stopped,
			4 => EngineStatus::Completed,
			_ => EngineStatus::Error,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, EngineStatus::Stopped | EngineStatus::Completed | EngineStatus::Error)
	}
}

#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
	pub fn new(initial: EngineStatus) -> Self {
		Self(AtomicU8::new(initial as u8))
	}

	pub fn get(&self) -> EngineStatus {
		EngineStatus::from_u8(self.0.load(Ordering::SeqCst))
	}

	pub fn set(&self, status: EngineStatus) {
		self.0.store(status as u8, Ordering::SeqCst);
	}
}
