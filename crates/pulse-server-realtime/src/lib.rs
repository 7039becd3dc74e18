// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Room-based realtime fan-out.
//!
//! Rooms are tenant keys (`{org}:{project}`). Delivery is fire-and-forget
//! over bounded per-subscriber channels: a slow subscriber drops messages
//! rather than stalling publishers. The registry mutates only on
//! connect/disconnect; publishing takes the read side.

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Per-subscriber channel capacity. Messages beyond this are dropped for
/// that subscriber.
pub const SUBSCRIBER_QUEUE_SIZE: usize = 64;

#[derive(Default)]
struct Registry {
	rooms: HashMap<String, HashMap<Uuid, mpsc::Sender<serde_json::Value>>>,
	memberships: HashMap<Uuid, String>,
}

/// Subscription registry mapping rooms to active subscribers.
#[derive(Default)]
pub struct RealtimeBus {
	registry: RwLock<Registry>,
}

impl RealtimeBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `sender` under `room` for connection `conn_id`. A
	/// connection already in another room is moved.
	pub async fn subscribe(
		&self,
		conn_id: Uuid,
		room: &str,
		sender: mpsc::Sender<serde_json::Value>,
	) {
		let mut registry = self.registry.write().await;

		if let Some(previous) = registry.memberships.insert(conn_id, room.to_string()) {
			if let Some(subscribers) = registry.rooms.get_mut(&previous) {
				subscribers.remove(&conn_id);
				if subscribers.is_empty() {
					registry.rooms.remove(&previous);
				}
			}
		}

		registry
			.rooms
			.entry(room.to_string())
			.or_default()
			.insert(conn_id, sender);
		debug!(conn_id = %conn_id, room, "subscriber joined room");
	}

	/// Remove a connection from its room, if any.
	pub async fn unsubscribe(&self, conn_id: Uuid) {
		let mut registry = self.registry.write().await;
		if let Some(room) = registry.memberships.remove(&conn_id) {
			if let Some(subscribers) = registry.rooms.get_mut(&room) {
				subscribers.remove(&conn_id);
				if subscribers.is_empty() {
					registry.rooms.remove(&room);
				}
			}
			debug!(conn_id = %conn_id, room = %room, "subscriber left room");
		}
	}

	/// Deliver `message` to every subscriber of `room`. Returns how many
	/// subscribers accepted it; full channels drop.
	pub async fn publish(&self, room: &str, message: serde_json::Value) -> usize {
		let registry = self.registry.read().await;
		let Some(subscribers) = registry.rooms.get(room) else {
			return 0;
		};

		let mut delivered = 0;
		for (conn_id, sender) in subscribers {
			match sender.try_send(message.clone()) {
				Ok(()) => delivered += 1,
				Err(mpsc::error::TrySendError::Full(_)) => {
					debug!(conn_id = %conn_id, room, "subscriber queue full, dropping message");
				}
				Err(mpsc::error::TrySendError::Closed(_)) => {
					debug!(conn_id = %conn_id, room, "subscriber channel closed");
				}
			}
		}
		delivered
	}

	pub async fn subscriber_count(&self, room: &str) -> usize {
		let registry = self.registry.read().await;
		registry.rooms.get(room).map(|s| s.len()).unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn publish_reaches_room_subscribers_only() {
		let bus = RealtimeBus::new();
		let (tx_a, mut rx_a) = mpsc::channel(8);
		let (tx_b, mut rx_b) = mpsc::channel(8);

		bus.subscribe(Uuid::new_v4(), "org1:web", tx_a).await;
		bus.subscribe(Uuid::new_v4(), "org2:web", tx_b).await;

		let delivered = bus.publish("org1:web", json!({"n": 1})).await;
		assert_eq!(delivered, 1);
		assert_eq!(rx_a.recv().await.unwrap(), json!({"n": 1}));
		assert!(rx_b.try_recv().is_err());
	}

	#[tokio::test]
	async fn unsubscribe_removes_connection() {
		let bus = RealtimeBus::new();
		let conn = Uuid::new_v4();
		let (tx, _rx) = mpsc::channel(8);

		bus.subscribe(conn, "org1:web", tx).await;
		assert_eq!(bus.subscriber_count("org1:web").await, 1);

		bus.unsubscribe(conn).await;
		assert_eq!(bus.subscriber_count("org1:web").await, 0);
		assert_eq!(bus.publish("org1:web", json!({})).await, 0);
	}

	#[tokio::test]
	async fn resubscribing_moves_rooms() {
		let bus = RealtimeBus::new();
		let conn = Uuid::new_v4();
		let (tx, _rx) = mpsc::channel(8);

		bus.subscribe(conn, "org1:web", tx.clone()).await;
		bus.subscribe(conn, "org1:mobile", tx).await;

		assert_eq!(bus.subscriber_count("org1:web").await, 0);
		assert_eq!(bus.subscriber_count("org1:mobile").await, 1);
	}

	#[tokio::test]
	async fn slow_subscriber_drops_instead_of_blocking() {
		let bus = RealtimeBus::new();
		let (tx, mut rx) = mpsc::channel(1);
		bus.subscribe(Uuid::new_v4(), "r", tx).await;

		assert_eq!(bus.publish("r", json!(1)).await, 1);
		// Queue is full now; the next publish drops for this subscriber.
		assert_eq!(bus.publish("r", json!(2)).await, 0);

		assert_eq!(rx.recv().await.unwrap(), json!(1));
	}
}
