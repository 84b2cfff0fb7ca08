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

use serde::{Deserialize, Serialize};

use crate::pacing::ReplayMode;

/// Configuration for a single-source `ReplayController` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
	pub mode: ReplayMode,
	pub speed_factor: f64,
	pub memory_optimized: bool,
	pub batch_callbacks: bool,
	pub timestamp_column: Option<String>,
	pub callback_queue_capacity: usize,
}

impl Default for ReplayConfig {
	fn default() -> Self {
		Self {
			mode: ReplayMode::Backtest,
			speed_factor: 1.0,
			memory_optimized: false,
			batch_callbacks: false,
			timestamp_column: None,
			callback_queue_capacity: 1024,
		}
	}
}

impl ReplayConfig {
	/// Loads configuration from `REPLAY_`-prefixed environment variables.
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::Environment::with_prefix("REPLAY"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Loads configuration from a file, overlaid with `REPLAY_`-prefixed
	/// environment variables.
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("REPLAY"))
			.build()?;

		cfg.try_deserialize()
	}
}

/// Configuration for a `MultiReplayController` merging several named
/// sources. Per-source timestamp extractors are registered in code (they
/// are functions, not config data); everything else is shared with
/// `ReplayConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiReplayConfig {
	pub mode: ReplayMode,
	pub speed_factor: f64,
	pub memory_optimized: bool,
	pub batch_callbacks: bool,
	pub callback_queue_capacity: usize,
}

impl Default for MultiReplayConfig {
	fn default() -> Self {
		Self {
			mode: ReplayMode::Backtest,
			speed_factor: 1.0,
			memory_optimized: false,
			batch_callbacks: false,
			callback_queue_capacity: 1024,
		}
	}
}

impl MultiReplayConfig {
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::Environment::with_prefix("REPLAY"))
			.build()?;

		cfg.try_deserialize()
	}

	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("REPLAY"))
			.build()?;

		cfg.try_deserialize()
	}
}
