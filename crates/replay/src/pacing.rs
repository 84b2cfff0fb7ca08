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

use std::time::Duration;

use replay_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Pacing policy controlling the delay between consecutive emissions (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayMode {
	/// No delay; rows are emitted back-to-back.
	Backtest,
	/// Emission is driven entirely by explicit `step()` calls.
	Stepped,
	/// Delay equals the wall-clock difference between consecutive timestamps.
	Realtime,
	/// Same as `Realtime`, divided by a speed factor.
	Accelerated,
}

impl Default for ReplayMode {
	fn default() -> Self {
		ReplayMode::Backtest
	}
}

/// Computes the delay to sleep after emitting a row, before fetching the
/// next one. `prev`/`next` are the timestamps of the row just emitted and
/// the row about to be emitted, in that order; `None` for either (missing
/// or first row) yields zero delay, as does any non-monotonic pair.
pub fn pacing_delay(mode: ReplayMode, speed_factor: f64, prev: Option<Timestamp>, next: Option<Timestamp>) -> Duration {
	match mode {
		ReplayMode::Backtest | ReplayMode::Stepped => Duration::ZERO,
		ReplayMode::Realtime | ReplayMode::Accelerated => {
			let (Some(prev), Some(next)) = (prev, next) else {
				return Duration::ZERO;
			};
			let delta = next - prev;
			let millis = delta.num_milliseconds();
			if millis <= 0 {
				return Duration::ZERO;
			}
			let millis = millis as f64;
			let scaled = match mode {
				ReplayMode::Accelerated => millis / speed_factor.max(f64::MIN_POSITIVE),
				_ => millis,
			};
			Duration::from_millis(scaled.max(0.0) as u64)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};

	fn ts(secs: i64) -> Timestamp {
		Utc.timestamp_opt(secs, 0).unwrap()
	}

	#[test]
	fn backtest_mode_has_no_delay() {
		let d = pacing_delay(ReplayMode::Backtest, 1.0, Some(ts(0)), Some(ts(10)));
		assert_eq!(d, Duration::ZERO);
	}

	#[test]
	fn realtime_mode_delays_by_delta() {
		let d = pacing_delay(ReplayMode::Realtime, 1.0, Some(ts(0)), Some(ts(2)));
		assert_eq!(d, Duration::from_secs(2));
	}

	#[test]
	fn accelerated_mode_divides_by_speed_factor() {
		let d = pacing_delay(ReplayMode::Accelerated, 4.0, Some(ts(0)), Some(ts(4)));
		assert_eq!(d, Duration::from_secs(1));
	}

	#[test]
	fn missing_timestamp_is_zero_delay() {
		let d = pacing_delay(ReplayMode::Realtime, 1.0, None, Some(ts(5)));
		assert_eq!(d, Duration::ZERO);
	}

	#[test]
	fn non_monotonic_timestamps_are_zero_delay() {
		let d = pacing_delay(ReplayMode::Realtime, 1.0, Some(ts(5)), Some(ts(2)));
		assert_eq!(d, Duration::ZERO);
	}
}
