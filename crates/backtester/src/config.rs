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

use crate::error::BacktesterError;

/// Configuration for an [`crate::backtester::EventDrivenBacktester`] (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktesterConfig {
	pub initial_capital: f64,
	pub commission_rate: f64,
	pub slippage: f64,
	pub allow_shorting: bool,
}

impl Default for BacktesterConfig {
	fn default() -> Self {
		Self { initial_capital: 100_000.0, commission_rate: 0.001, slippage: 0.0, allow_shorting: false }
	}
}

impl BacktesterConfig {
	pub fn validate(&self) -> Result<(), BacktesterError> {
		if !(self.initial_capital > 0.0) {
			return Err(BacktesterError::InvalidInitialCapital(self.initial_capital));
		}
		if !(0.0..1.0).contains(&self.commission_rate) {
			return Err(BacktesterError::InvalidCommissionRate(self.commission_rate));
		}
		if self.slippage < 0.0 {
			return Err(BacktesterError::InvalidSlippage(self.slippage));
		}
		Ok(())
	}

	/// Loads configuration from `BACKTESTER_`-prefixed environment variables.
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::Environment::with_prefix("BACKTESTER"))
			.build()?;
		cfg.try_deserialize()
	}

	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Config::try_from(&Self::default())?)
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("BACKTESTER"))
			.build()?;
		cfg.try_deserialize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		assert!(BacktesterConfig::default().validate().is_ok());
	}

	#[test]
	fn rejects_non_positive_capital() {
		let cfg = BacktesterConfig { initial_capital: 0.0, ..BacktesterConfig::default() };
		assert!(matches!(cfg.validate(), Err(BacktesterError::InvalidInitialCapital(_))));
	}

	#[test]
	fn rejects_commission_rate_out_of_range() {
		let cfg = BacktesterConfig { commission_rate: 1.0, ..BacktesterConfig::default() };
		assert!(matches!(cfg.validate(), Err(BacktesterError::InvalidCommissionRate(_))));
	}

	#[test]
	fn rejects_negative_slippage() {
		let cfg = BacktesterConfig { slippage: -0.1, ..BacktesterConfig::default() };
		assert!(matches!(cfg.validate(), Err(BacktesterError::InvalidSlippage(_))));
	}
}
