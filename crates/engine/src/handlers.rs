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

use std::collections::HashMap;
use std::sync::Mutex;

use replay_core::{Event, EventType};

pub type HandlerId = u64;
pub type Handler = Box<dyn FnMut(&Event) + Send>;

struct Inner {
	by_type: HashMap<EventType, Vec<(HandlerId, Handler)>>,
	wildcard: Vec<(HandlerId, Handler)>,
	next_id: HandlerId,
}

/// `event_type → ordered handler list`, plus a wildcard bucket keyed by
/// `"*"` that receives every event (§3.3).
///
/// Rust closures carry no runtime identity, so the source's "registering
/// the same function object twice is a no-op" dedup rule has no faithful
/// equivalent here: every `register` call gets a fresh id. Callers that
/// want idempotent registration should hold onto the returned id and call
/// `unregister` themselves before re-registering.
pub struct HandlerTable(Mutex<Inner>);

impl Default for HandlerTable {
	fn default() -> Self {
		Self::new()
	}
}

impl HandlerTable {
	pub fn new() -> Self {
		Self(Mutex::new(Inner { by_type: HashMap::new(), wildcard: Vec::new(), next_id: 0 }))
	}

	pub fn register(&self, event_type: EventType, handler: Handler) -> HandlerId {
		let mut inner = self.0.lock().unwrap();
		let id = inner.next_id;
		inner.next_id += 1;
		inner.by_type.entry(event_type).or_default().push((id, handler));
		id
	}

	pub fn register_wildcard(&self, handler: Handler) -> HandlerId {
		let mut inner = self.0.lock().unwrap();
		let id = inner.next_id;
		inner.next_id += 1;
		inner.wildcard.push((id, handler));
		id
	}

	pub fn unregister(&self, id: HandlerId) -> bool {
		let mut inner = self.0.lock().unwrap();
		let mut removed = false;
		for list in inner.by_type.values_mut() {
			let before = list.len();
			list.retain(|(hid, _)| *hid != id);
			removed |= list.len() != before;
		}
		let before = inner.wildcard.len();
		inner.wildcard.retain(|(hid, _)| *hid != id);
		removed |= inner.wildcard.len() != before;
		removed
	}

	/// Dispatches `event` to its type-specific handlers, then the wildcard
	/// handlers, in that order (§4.5). The two lists are swapped out of the
	/// lock for the duration of dispatch so it is never held across user
	/// code. Returns the ids of handlers that panicked.
	pub fn dispatch(&self, event: &Event) -> Vec<HandlerId> {
		let event_type = event.event_type();
		let (mut typed, mut wildcard) = {
			let mut inner = self.0.lock().unwrap();
			let typed = inner.by_type.get_mut(&event_type).map(std::mem::take).unwrap_or_default();
			let wildcard = std::mem::take(&mut inner.wildcard);
			(typed, wildcard)
		};

		let mut failed = Vec::new();
		for (id, handler) in typed.iter_mut().chain(wildcard.iter_mut()) {
			let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event)));
			if result.is_err() {
				failed.push(*id);
			}
		}

		let mut inner = self.0.lock().unwrap();
		if !typed.is_empty() {
			inner.by_type.entry(event_type).or_default().extend(typed);
		}
		inner.wildcard.extend(wildcard);
		failed
	}

	pub fn handler_count(&self, event_type: EventType) -> usize {
		let inner = self.0.lock().unwrap();
		inner.by_type.get(&event_type).map(|v| v.len()).unwrap_or(0)
	}

	pub fn wildcard_count(&self) -> usize {
		self.0.lock().unwrap().wildcard.len()
	}
}
