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

use crate::error::EngineError;

/// Configuration for an [`crate::manager::EngineManager`] (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	pub queue_capacity: usize,
	pub send_timeout_ms: u64,
	pub dispatch_batch_size: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self { queue_capacity: 4096, send_timeout_ms: 1000, dispatch_batch_size: 100 }
	}
}

impl EngineConfig {
	pub fn validate(&self) -> Result<(), EngineError> {
		if self.queue_capacity == 0 {
			return Err(EngineError::InvalidQueueCapacity);
		}
		if self.dispatch_batch_size == 0 || self.dispatch_batch_size > 1000 {
			return Err(EngineError::InvalidDispatchBatchSize);
		}
		Ok(())
	}

	/// Loads configuration from `ENGINE_`-prefixed environment variables.
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::Environment::with_prefix("ENGINE"))
			.build()?;
		cfg.try_deserialize()
	}

	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("ENGINE"))
			.build()?;
		cfg.try_deserialize()
	}
}
