// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Per-tenant coalescing buffers.
//!
//! One ordered buffer per tenant key, created lazily. Flushing detaches
//! the buffer atomically under the map lock and replaces it with an
//! empty one, so producers and the sweeper never observe a half-drained
//! buffer.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use pulse_core::Event;

struct TenantBuffer {
	events: Vec<Event>,
	oldest_at: Instant,
}

impl TenantBuffer {
	fn new() -> Self {
		Self {
			events: Vec::new(),
			oldest_at: Instant::now(),
		}
	}
}

/// Map of tenant key (`{org}:{project}`) to its in-flight buffer.
#[derive(Default)]
pub struct TenantBuffers {
	buffers: Mutex<HashMap<String, TenantBuffer>>,
}

impl TenantBuffers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an event to its tenant's buffer, preserving submission
	/// order. When the buffer reaches `flush_size` it is detached and
	/// returned for enqueueing.
	pub async fn push(&self, tenant_key: &str, event: Event, flush_size: usize) -> Option<Vec<Event>> {
		let mut buffers = self.buffers.lock().await;
		let buffer = buffers
			.entry(tenant_key.to_string())
			.or_insert_with(TenantBuffer::new);

		if buffer.events.is_empty() {
			buffer.oldest_at = Instant::now();
		}
		buffer.events.push(event);

		if buffer.events.len() >= flush_size {
			let detached = std::mem::take(&mut buffer.events);
			buffers.remove(tenant_key);
			Some(detached)
		} else {
			None
		}
	}

	/// Detach every buffer whose oldest event exceeds `max_age`.
	pub async fn drain_aged(&self, max_age: Duration) -> Vec<(String, Vec<Event>)> {
		let mut buffers = self.buffers.lock().await;
		let aged: Vec<String> = buffers
			.iter()
			.filter(|(_, buffer)| buffer.oldest_at.elapsed() >= max_age)
			.map(|(key, _)| key.clone())
			.collect();

		aged
			.into_iter()
			.filter_map(|key| buffers.remove(&key).map(|buffer| (key, buffer.events)))
			.collect()
	}

	/// Detach every non-empty buffer. Used on graceful shutdown.
	pub async fn drain_all(&self) -> Vec<(String, Vec<Event>)> {
		let mut buffers = self.buffers.lock().await;
		buffers
			.drain()
			.map(|(key, buffer)| (key, buffer.events))
			.collect()
	}

	/// Number of buffered events for one tenant.
	pub async fn len(&self, tenant_key: &str) -> usize {
		let buffers = self.buffers.lock().await;
		buffers
			.get(tenant_key)
			.map(|buffer| buffer.events.len())
			.unwrap_or(0)
	}

	pub async fn is_empty(&self) -> bool {
		let buffers = self.buffers.lock().await;
		buffers.values().all(|buffer| buffer.events.is_empty())
	}
}
