use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use event_engine::{EngineConfig, EngineManager};
use replay_core::{Direction, Event, EventType, MarketData, Ohlcv};

fn market_event() -> Event {
	Event::market(Utc::now(), "AAPL", MarketData::Ohlcv(Ohlcv { open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }))
}

fn drain(count: &AtomicUsize, target: usize) {
	let deadline = Instant::now() + Duration::from_secs(2);
	while count.load(Ordering::SeqCst) < target && Instant::now() < deadline {
		std::thread::sleep(Duration::from_millis(5));
	}
}

/// I3: dispatched count per handler equals the number of enqueued events
/// of matching type that arrived while the handler was registered.
#[test]
fn i3_processed_count_matches_dispatched_events() {
	let mut engine = EngineManager::new(EngineConfig::default()).unwrap();
	engine.start().unwrap();

	let count = Arc::new(AtomicUsize::new(0));
	let count_clone = count.clone();
	engine.register_event_handler(EventType::Market, Box::new(move |_e| {
		count_clone.fetch_add(1, Ordering::SeqCst);
	}));

	for _ in 0..10 {
		assert!(engine.send_event(market_event()));
	}
	drain(&count, 10);
	engine.stop();

	assert_eq!(count.load(Ordering::SeqCst), 10);
	assert_eq!(engine.counters().processed_count(EventType::Market), 10);
}

/// Wildcard handlers observe every variant, regardless of type.
#[test]
fn wildcard_handler_sees_every_event_type() {
	let mut engine = EngineManager::new(EngineConfig::default()).unwrap();
	engine.start().unwrap();

	let seen = Arc::new(Mutex::new(Vec::new()));
	let seen_clone = seen.clone();
	engine.register_wildcard_handler(Box::new(move |e| seen_clone.lock().unwrap().push(e.event_type())));

	assert!(engine.send_event(market_event()));
	assert!(engine.send_event(Event::signal(Utc::now(), "AAPL", Direction::Long, 0.8).unwrap()));

	let deadline = Instant::now() + Duration::from_secs(2);
	while seen.lock().unwrap().len() < 2 && Instant::now() < deadline {
		std::thread::sleep(Duration::from_millis(5));
	}
	engine.stop();

	let seen = seen.lock().unwrap();
	assert_eq!(*seen, vec![EventType::Market, EventType::Signal]);
}
