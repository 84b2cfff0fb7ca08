use chrono::{TimeZone, Utc};
use replay_core::{CellValue, Row};
use replay_controller::{InMemoryTable, ReplayConfig, ReplayController, ReplayMode, ReplayStatus};

fn ts_row(ts_secs: i64, close: f64) -> Row {
	let mut r = Row::new();
	r.insert("ts".to_string(), CellValue::Timestamp(Utc.timestamp_opt(ts_secs, 0).unwrap()));
	r.insert("close".to_string(), CellValue::Float(close));
	r
}

/// S1: single-source Backtest replay emits every row in order, stamped
/// with `_source` and `_timestamp`, and completes.
#[test]
fn s1_single_source_backtest_replay() {
	let rows = vec![ts_row(0, 100.0), ts_row(1, 101.0), ts_row(2, 102.0)];
	let table = InMemoryTable::new(vec!["ts".into(), "close".into()], rows).with_timestamp_column("ts");
	let controller = ReplayController::new("default", Box::new(table), ReplayConfig::default());

	let emitted = controller.process_all_sync();

	assert_eq!(emitted.len(), 3);
	for (i, row) in emitted.iter().enumerate() {
		assert_eq!(row.get("_source").unwrap().as_str(), Some("default"));
		assert!(row.contains_key("_timestamp"));
		assert_eq!(row.get("index").unwrap().as_f64(), Some(i as f64));
	}
	assert_eq!(controller.get_status(), ReplayStatus::Completed);
}

/// S3: Stepped mode advances exactly one row per `step()`, pausing after
/// each, and `stop()` transitions cleanly to Stopped.
#[test]
fn s3_stepped_mode_advances_one_row_at_a_time() {
	let rows: Vec<Row> = (0..5).map(|i| ts_row(i, 100.0 + i as f64)).collect();
	let table = InMemoryTable::new(vec!["ts".into(), "close".into()], rows).with_timestamp_column("ts");
	let mut config = ReplayConfig::default();
	config.mode = ReplayMode::Stepped;
	let mut controller = ReplayController::new("default", Box::new(table), config);

	let mut seen = Vec::new();
	for _ in 0..3 {
		let row = controller.step().expect("row expected");
		seen.push(row);
		assert_eq!(controller.get_status(), ReplayStatus::Paused);
	}
	assert_eq!(seen.len(), 3);

	assert!(controller.stop());
	assert_eq!(controller.get_status(), ReplayStatus::Stopped);
}

/// I1: process_all_sync's emitted length equals the source row count, for
/// any source length including the empty and single-row boundaries (§8).
#[test]
fn i1_emitted_length_matches_source_length() {
	for n in [0usize, 1, 7] {
		let rows: Vec<Row> = (0..n as i64).map(|i| ts_row(i, 1.0)).collect();
		let table = InMemoryTable::new(vec!["ts".into()], rows).with_timestamp_column("ts");
		let controller = ReplayController::new("default", Box::new(table), ReplayConfig::default());
		let emitted = controller.process_all_sync();
		assert_eq!(emitted.len(), n);
	}
}

/// I5: reset() followed by process_all_sync() reproduces the first run.
#[test]
fn i5_reset_then_replay_is_identical() {
	let rows: Vec<Row> = (0..4).map(|i| ts_row(i, 10.0 * i as f64)).collect();
	let table = InMemoryTable::new(vec!["ts".into()], rows).with_timestamp_column("ts");
	let mut controller = ReplayController::new("default", Box::new(table), ReplayConfig::default());

	let first = controller.process_all_sync();
	controller.reset().expect("reset should succeed from Completed");
	assert_eq!(controller.get_status(), ReplayStatus::Initialized);
	let second = controller.process_all_sync();

	assert_eq!(first, second);
}
