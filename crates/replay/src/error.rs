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

use thiserror::Error;

use crate::status::ReplayStatus;

#[derive(Debug, Error)]
pub enum ReplayError {
	#[error("invalid state transition: {op} not allowed while {current:?}")]
	InvalidTransition { op: &'static str, current: ReplayStatus },

	#[error("speed factor must be > 0, got {0}")]
	InvalidSpeedFactor(f64),

	#[error("cannot change mode while Running")]
	ModeLockedWhileRunning,

	#[error("source {0:?} is unknown to this controller")]
	UnknownSource(String),

	#[error("worker thread join timed out after {0:?}")]
	JoinTimeout(std::time::Duration),

	#[error("config error: {0}")]
	Config(#[from] config::ConfigError),
}
