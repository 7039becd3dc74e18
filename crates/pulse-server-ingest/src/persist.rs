// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Queue worker side of the pipeline: persist a batch, bump counters,
//! fan out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use pulse_core::{Event, OrgId, ProjectId};
use pulse_server_cache::Cache;
use pulse_server_db::EventStore;
use pulse_server_queue::{JobError, JobHandler};
use pulse_server_realtime::RealtimeBus;

/// Queue topic carrying event batches.
pub const EVENT_PERSIST_TOPIC: &str = "events.persist";

/// A coalesced batch of one tenant's events, as enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistBatch {
	pub org_id: OrgId,
	pub project_id: ProjectId,
	pub events: Vec<Event>,
}

/// Handler for [`EVENT_PERSIST_TOPIC`] jobs.
///
/// Per-event store failures are recorded but do not fail the job; only a
/// wholesale store outage is retryable. Counter bumps and bus fan-out
/// are best-effort.
pub struct PersistEventsHandler<S: EventStore> {
	store: Arc<S>,
	cache: Arc<dyn Cache>,
	bus: Arc<RealtimeBus>,
	counter_ttl: Duration,
}

impl<S: EventStore> PersistEventsHandler<S> {
	pub fn new(
		store: Arc<S>,
		cache: Arc<dyn Cache>,
		bus: Arc<RealtimeBus>,
		counter_ttl: Duration,
	) -> Self {
		Self {
			store,
			cache,
			bus,
			counter_ttl,
		}
	}

	async fn bump_counters(&self, batch_org: &OrgId, batch_project: &ProjectId, events: &[Event]) {
		let total_key = format!("events:{batch_org}:{batch_project}:count");
		if let Err(e) = self
			.cache
			.incr_by(&total_key, events.len() as i64, self.counter_ttl)
			.await
		{
			warn!(error = %e, "failed to bump tenant event counter");
		}

		for event in events {
			let key = format!(
				"events:{batch_org}:{batch_project}:{}:count",
				event.event_name
			);
			if let Err(e) = self.cache.incr_by(&key, 1, self.counter_ttl).await {
				warn!(error = %e, "failed to bump per-event counter");
				break;
			}
		}
	}

	async fn fan_out(&self, room: &str, events: &[Event]) {
		for event in events {
			let message = serde_json::json!({
				"type": "new_event",
				"data": {
					"eventName": event.event_name,
					"userId": event.user_id,
					"timestamp": event.timestamp,
					"properties": event.properties,
				},
				"timestamp": chrono::Utc::now(),
			});
			self.bus.publish(room, message).await;
		}
	}
}

#[async_trait]
impl<S: EventStore> JobHandler for PersistEventsHandler<S> {
	async fn handle(&self, payload: serde_json::Value) -> Result<(), JobError> {
		let batch: PersistBatch = serde_json::from_value(payload)
			.map_err(|e| JobError::permanent(format!("malformed persist batch: {e}")))?;

		let room = format!("{}:{}", batch.org_id, batch.project_id);
		let outcome = self
			.store
			.insert_many(batch.events)
			.await
			.map_err(|e| JobError::retryable(format!("event store unavailable: {e}")))?;

		if !outcome.failures.is_empty() {
			warn!(
				failures = outcome.failures.len(),
				"some events in batch failed to persist"
			);
		}

		if !outcome.persisted.is_empty() {
			self.bump_counters(&batch.org_id, &batch.project_id, &outcome.persisted)
				.await;
			self.fan_out(&room, &outcome.persisted).await;
		}

		debug!(
			room = %room,
			persisted = outcome.persisted.len(),
			duplicates = outcome.duplicates,
			"event batch persisted"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use pulse_core::{EventPayload, Tenant};
	use pulse_server_cache::MemoryCache;
	use pulse_server_db::{testing::test_pool, EventRepository, ScanFilter};
	use tokio::sync::mpsc;
	use uuid::Uuid;

	fn tenant() -> Tenant {
		Tenant::new(OrgId::new("org1").unwrap(), ProjectId::new("p1").unwrap())
	}

	fn event(user: &str, name: &str, ts: &str) -> Event {
		EventPayload {
			user_id: user.to_string(),
			event_name: name.to_string(),
			timestamp: Some(ts.to_string()),
			..Default::default()
		}
		.into_event(&tenant(), Utc::now(), None, None)
		.unwrap()
	}

	async fn handler() -> (
		PersistEventsHandler<EventRepository>,
		Arc<EventRepository>,
		Arc<MemoryCache>,
		Arc<RealtimeBus>,
	) {
		let store = Arc::new(EventRepository::new(test_pool().await));
		let cache = Arc::new(MemoryCache::new());
		let bus = Arc::new(RealtimeBus::new());
		let handler = PersistEventsHandler::new(
			Arc::clone(&store),
			cache.clone() as Arc<dyn Cache>,
			Arc::clone(&bus),
			Duration::from_secs(3_600),
		);
		(handler, store, cache, bus)
	}

	fn batch_payload(events: Vec<Event>) -> serde_json::Value {
		let t = tenant();
		serde_json::to_value(PersistBatch {
			org_id: t.org_id,
			project_id: t.project_id,
			events,
		})
		.unwrap()
	}

	#[tokio::test]
	async fn persists_bumps_counters_and_fans_out() {
		let (handler, store, cache, bus) = handler().await;

		let (tx, mut rx) = mpsc::channel(8);
		bus.subscribe(Uuid::new_v4(), "org1:p1", tx).await;

		let events = vec![
			event("u1", "page_view", "2024-01-01T10:00:00Z"),
			event("u2", "page_view", "2024-01-01T10:01:00Z"),
		];
		handler.handle(batch_payload(events)).await.unwrap();

		let count = store.count(&tenant(), &ScanFilter::default()).await.unwrap();
		assert_eq!(count, 2);

		assert_eq!(
			cache.get("events:org1:p1:count").await.unwrap(),
			Some("2".to_string())
		);
		assert_eq!(
			cache.get("events:org1:p1:page_view:count").await.unwrap(),
			Some("2".to_string())
		);

		let message = rx.recv().await.unwrap();
		assert_eq!(message["type"], "new_event");
		assert_eq!(message["data"]["eventName"], "page_view");
		assert_eq!(message["data"]["userId"], "u1");
	}

	#[tokio::test]
	async fn store_level_duplicates_do_not_fail_the_job() {
		let (handler, store, _cache, _bus) = handler().await;

		let original = event("u1", "a", "2024-01-01T10:00:00Z");
		let duplicate = event("u1", "a", "2024-01-01T10:00:00Z");

		handler
			.handle(batch_payload(vec![original]))
			.await
			.unwrap();
		handler
			.handle(batch_payload(vec![duplicate]))
			.await
			.unwrap();

		let count = store.count(&tenant(), &ScanFilter::default()).await.unwrap();
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn malformed_payload_is_permanent_failure() {
		let (handler, _store, _cache, _bus) = handler().await;

		let err = handler
			.handle(serde_json::json!({"not": "a batch"}))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			JobError::Failed {
				retryable: false,
				..
			}
		));
	}
}
