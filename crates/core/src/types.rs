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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical event time, sourced from the replayed data rather than wall clock.
pub type Timestamp = DateTime<Utc>;

/// Monotonically increasing id assigned to an event by the engine that enqueues it.
pub type EventId = u64;

/// Order identifier, assigned by the producer at construction time.
pub type OrderId = String;

/// Instrument identifier (e.g. "AAPL", "BTC-USDT").
pub type Symbol = String;

/// A single column value inside a replayed row.
///
/// Tabular sources are schema-less at this layer: a row is a map of
/// column name to `CellValue`, and the replay controller only ever
/// looks for a handful of reserved keys (`_timestamp`, `_source`,
/// `index`) plus whatever a configured timestamp column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
	Float(f64),
	Int(i64),
	Str(String),
	Bool(bool),
	Timestamp(Timestamp),
	Null,
}

impl CellValue {
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			CellValue::Float(v) => Some(*v),
			CellValue::Int(v) => Some(*v as f64),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			CellValue::Str(v) => Some(v.as_str()),
			_ => None,
		}
	}

	pub fn as_timestamp(&self) -> Option<Timestamp> {
		match self {
			CellValue::Timestamp(ts) => Some(*ts),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, CellValue::Null)
	}
}

impl From<f64> for CellValue {
	fn from(v: f64) -> Self {
		CellValue::Float(v)
	}
}

impl From<i64> for CellValue {
	fn from(v: i64) -> Self {
		CellValue::Int(v)
	}
}

impl From<String> for CellValue {
	fn from(v: String) -> Self {
		CellValue::Str(v)
	}
}

impl From<&str> for CellValue {
	fn from(v: &str) -> Self {
		CellValue::Str(v.to_string())
	}
}

impl From<Timestamp> for CellValue {
	fn from(v: Timestamp) -> Self {
		CellValue::Timestamp(v)
	}
}

/// A single data point: the source's own columns plus whatever reserved
/// keys the replay controller stamps on (`_timestamp`, `_source`, `index`).
///
/// `BTreeMap` rather than `HashMap` so that emitted rows iterate and
/// serialize in a deterministic column order, useful for diagnostics and
/// for reproducing `process_all_sync()` output byte-for-byte across runs.
pub type Row = BTreeMap<String, CellValue>;

/// Reserved column key: the row's logical timestamp, duplicated for convenience.
pub const COL_TIMESTAMP: &str = "_timestamp";
/// Reserved column key: the name of the controller/source that produced the row.
pub const COL_SOURCE: &str = "_source";
/// Reserved column key: the row's original 0-based index in its source.
pub const COL_INDEX: &str = "index";

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cell_value_conversions() {
		let v: CellValue = 3.5.into();
		assert_eq!(v.as_f64(), Some(3.5));

		let v: CellValue = "AAPL".into();
		assert_eq!(v.as_str(), Some("AAPL"));

		assert!(CellValue::Null.is_null());
		assert_eq!(CellValue::Null.as_f64(), None);
	}
}
