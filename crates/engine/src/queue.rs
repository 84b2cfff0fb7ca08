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

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use replay_core::Event;

/// Bounded FIFO queue between producers (`send_event` callers) and the
/// engine's dispatcher worker (§4.5). Overflow policy: block the producer
/// up to a configured timeout, then fail the send — mirrors the ingress
/// queue's backpressure contract, but blocking rather than `try_send`
/// since `send_event`'s contract calls for a bounded wait.
pub struct EventQueue {
	sender: Sender<Event>,
	receiver: Receiver<Event>,
}

impl EventQueue {
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = channel::bounded(capacity);
		Self { sender, receiver }
	}

	pub fn split(self) -> (EventSender, EventReceiver) {
		(EventSender { sender: self.sender }, EventReceiver { receiver: self.receiver })
	}
}

#[derive(Clone)]
pub struct EventSender {
	sender: Sender<Event>,
}

impl EventSender {
	/// Blocks up to `timeout` if the queue is full; returns `true` iff the
	/// event was enqueued.
	pub fn send_timeout(&self, event: Event, timeout: Duration) -> bool {
		self.sender.send_timeout(event, timeout).is_ok()
	}

	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}

	pub fn len(&self) -> usize {
		self.sender.len()
	}
}

pub struct EventReceiver {
	receiver: Receiver<Event>,
}

impl EventReceiver {
	pub fn recv_timeout(&self, timeout: Duration) -> Result<Event, QueueError> {
		self.receiver.recv_timeout(timeout).map_err(|e| match e {
			RecvTimeoutError::Timeout => QueueError::Empty,
			RecvTimeoutError::Disconnected => QueueError::Disconnected,
		})
	}

	pub fn try_recv(&self) -> Result<Event, QueueError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => QueueError::Empty,
			TryRecvError::Disconnected => QueueError::Disconnected,
		})
	}

	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("queue is empty")]
	Empty,
	#[error("queue disconnected")]
	Disconnected,
}
