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

use replay_core::{COL_INDEX, CellValue, Row, Timestamp};

/// A time-indexed tabular source the replay controller iterates over.
///
/// Data ingestion and file/remote adapters are out of scope for this
/// crate (§1); this trait is the seam they plug into. `row` takes an
/// owned index rather than a cursor/iterator type so that the controller
/// can rebuild its position deterministically on `reset()`.
pub trait TabularSource: Send {
	/// Number of rows in the source.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Fetches row `index`, or `None` if out of range.
	fn row(&self, index: usize) -> Option<Row>;

	/// Extracts the logical timestamp of a row, if the source can supply one.
	fn timestamp_of(&self, row: &Row) -> Option<Timestamp>;

	/// The source's own column names, for introspection/diagnostics.
	fn columns(&self) -> &[String];
}

/// A fully materialized in-memory table. The simplest possible
/// `TabularSource`; used directly by tests and by any caller that has
/// already loaded its data into memory.
#[derive(Debug, Clone)]
pub struct InMemoryTable {
	columns: Vec<String>,
	rows: Vec<Row>,
	timestamp_column: Option<String>,
}

impl InMemoryTable {
	pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
		Self { columns, rows, timestamp_column: None }
	}

	/// Names the column whose value should be interpreted as the row's
	/// timestamp (mirrors the `timestamp_column` config option in §6).
	pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
		self.timestamp_column = Some(column.into());
		self
	}
}

impl TabularSource for InMemoryTable {
	fn len(&self) -> usize {
		self.rows.len()
	}

	fn row(&self, index: usize) -> Option<Row> {
		self.rows.get(index).cloned()
	}

	/// Uses the configured column if one was named; otherwise falls back to
	/// the row's `index` column if it holds a timestamp-typed value, and
	/// treats the row as having no timestamp otherwise (§4.4).
	fn timestamp_of(&self, row: &Row) -> Option<Timestamp> {
		match self.timestamp_column.as_deref() {
			Some(column) => row.get(column).and_then(CellValue::as_timestamp),
			None => row.get(COL_INDEX).and_then(CellValue::as_timestamp),
		}
	}

	fn columns(&self) -> &[String] {
		&self.columns
	}
}
