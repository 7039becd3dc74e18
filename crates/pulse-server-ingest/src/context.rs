// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use pulse_core::{Event, EventPayload, PulseError, Tenant, MAX_BATCH_SIZE};
use pulse_server_cache::Cache;
use pulse_server_config::IngestConfig;
use pulse_server_queue::JobQueue;
use pulse_server_realtime::RealtimeBus;

use crate::buffer::TenantBuffers;
use crate::persist::{PersistBatch, EVENT_PERSIST_TOPIC};

/// Dedup markers live for 24 hours.
const DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Transport metadata captured at receipt.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
	pub user_agent: Option<String>,
	pub ip_address: Option<String>,
}

/// One payload rejected during validation, with per-field reasons.
#[derive(Debug, Clone)]
pub struct SkippedEvent {
	pub index: usize,
	pub reasons: Vec<String>,
}

/// Outcome of one ingest request.
#[derive(Debug, Default)]
pub struct IngestReport {
	/// Events accepted into a buffer.
	pub processed: usize,
	/// Events discarded as duplicates.
	pub duplicates: usize,
	/// Payloads rejected by validation.
	pub skipped: Vec<SkippedEvent>,
}

/// Everything the ingestion path needs, constructed once at startup and
/// injected. Owns the tenant buffer map.
pub struct IngestionContext {
	buffers: TenantBuffers,
	queue: Arc<JobQueue>,
	cache: Arc<dyn Cache>,
	bus: Arc<RealtimeBus>,
	config: IngestConfig,
}

impl IngestionContext {
	pub fn new(
		queue: Arc<JobQueue>,
		cache: Arc<dyn Cache>,
		bus: Arc<RealtimeBus>,
		config: IngestConfig,
	) -> Self {
		Self {
			buffers: TenantBuffers::new(),
			queue,
			cache,
			bus,
			config,
		}
	}

	pub fn bus(&self) -> &Arc<RealtimeBus> {
		&self.bus
	}

	pub fn queue(&self) -> &Arc<JobQueue> {
		&self.queue
	}

	pub fn cache(&self) -> &Arc<dyn Cache> {
		&self.cache
	}

	pub fn config(&self) -> &IngestConfig {
		&self.config
	}

	/// Ingest a batch of raw payloads for `tenant`.
	///
	/// Per-event validation failures are reported as skipped and never
	/// fail the batch; an empty or oversized batch fails whole with
	/// `InvalidInput`. Submission order is preserved into the buffer.
	#[tracing::instrument(skip(self, payloads, client), fields(tenant = %tenant, count = payloads.len()))]
	pub async fn ingest(
		&self,
		tenant: &Tenant,
		payloads: Vec<EventPayload>,
		client: ClientInfo,
	) -> Result<IngestReport, PulseError> {
		if payloads.is_empty() {
			return Err(PulseError::invalid("batch must contain at least one event"));
		}
		if payloads.len() > MAX_BATCH_SIZE {
			return Err(PulseError::invalid(format!(
				"batch exceeds {MAX_BATCH_SIZE} events"
			)));
		}

		let received_at = Utc::now();
		let tenant_key = tenant.key();
		let mut report = IngestReport::default();

		for (index, payload) in payloads.into_iter().enumerate() {
			let event = match payload.into_event(
				tenant,
				received_at,
				client.user_agent.clone(),
				client.ip_address.clone(),
			) {
				Ok(event) => event,
				Err(reasons) => {
					report.skipped.push(SkippedEvent { index, reasons });
					continue;
				}
			};

			if self.is_duplicate(tenant, &event).await {
				report.duplicates += 1;
				continue;
			}

			if let Some(batch) = self
				.buffers
				.push(&tenant_key, event, self.config.batch_size)
				.await
			{
				self.enqueue_batch(tenant, batch).await?;
			}
			report.processed += 1;
		}

		debug!(
			processed = report.processed,
			duplicates = report.duplicates,
			skipped = report.skipped.len(),
			"ingest request handled"
		);
		Ok(report)
	}

	/// Consult and write the dedup marker in one atomic step. Cache
	/// failures allow the event through: the store's fingerprint index
	/// catches duplicates that slip past.
	async fn is_duplicate(&self, tenant: &Tenant, event: &Event) -> bool {
		let key = format!(
			"dedup:{}:{}:{}",
			tenant.org_id,
			tenant.project_id,
			event.fingerprint()
		);

		match self.cache.set_nx(&key, "1", DEDUP_TTL).await {
			Ok(wrote) => !wrote,
			Err(e) => {
				warn!(error = %e, "dedup cache unavailable, allowing event through");
				false
			}
		}
	}

	async fn enqueue_batch(&self, tenant: &Tenant, events: Vec<Event>) -> Result<(), PulseError> {
		let count = events.len();
		let batch = PersistBatch {
			org_id: tenant.org_id.clone(),
			project_id: tenant.project_id.clone(),
			events,
		};
		let payload = serde_json::to_value(&batch)
			.map_err(|e| PulseError::Internal(format!("batch serialization failed: {e}")))?;

		self.queue
			.enqueue(EVENT_PERSIST_TOPIC, payload)
			.await
			.map_err(|e| {
				warn!(error = %e, "failed to enqueue event batch");
				PulseError::TransientDependency("event queue unavailable".to_string())
			})?;

		debug!(tenant = %tenant, count, "event batch enqueued");
		Ok(())
	}

	/// Flush buffers whose oldest event exceeds the configured age.
	/// Called by the sweeper.
	pub async fn flush_aged(&self) -> Result<usize, PulseError> {
		let max_age = Duration::from_millis(self.config.buffer_timeout_ms);
		let drained = self.buffers.drain_aged(max_age).await;
		self.flush_drained(drained).await
	}

	/// Flush every buffer. Called on graceful shutdown.
	pub async fn flush_all(&self) -> Result<usize, PulseError> {
		let drained = self.buffers.drain_all().await;
		self.flush_drained(drained).await
	}

	async fn flush_drained(
		&self,
		drained: Vec<(String, Vec<Event>)>,
	) -> Result<usize, PulseError> {
		let mut flushed = 0;
		for (tenant_key, events) in drained {
			if events.is_empty() {
				continue;
			}
			// Buffers only ever hold events of their own tenant.
			let tenant = events[0].tenant();
			debug_assert_eq!(tenant.key(), tenant_key);
			flushed += events.len();
			self.enqueue_batch(&tenant, events).await?;
		}
		Ok(flushed)
	}

	/// Number of buffered events for one tenant, for tests and health.
	pub async fn buffered(&self, tenant: &Tenant) -> usize {
		self.buffers.len(&tenant.key()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_core::{OrgId, ProjectId};
	use pulse_server_cache::MemoryCache;
	use pulse_server_db::{testing::test_pool, QueueRepository};

	fn tenant() -> Tenant {
		Tenant::new(OrgId::new("org1").unwrap(), ProjectId::new("p1").unwrap())
	}

	fn payload(user: &str, name: &str, ts: &str) -> EventPayload {
		EventPayload {
			user_id: user.to_string(),
			event_name: name.to_string(),
			timestamp: Some(ts.to_string()),
			..Default::default()
		}
	}

	async fn context(batch_size: usize) -> IngestionContext {
		let queue = Arc::new(JobQueue::new(Arc::new(QueueRepository::new(
			test_pool().await,
		))));
		IngestionContext::new(
			queue,
			Arc::new(MemoryCache::new()),
			Arc::new(RealtimeBus::new()),
			IngestConfig {
				batch_size,
				buffer_timeout_ms: 5_000,
				worker_concurrency: 1,
			},
		)
	}

	#[tokio::test]
	async fn valid_events_are_buffered() {
		let ctx = context(100).await;
		let t = tenant();

		let report = ctx
			.ingest(
				&t,
				vec![
					payload("u1", "a", "2024-01-01T10:00:00Z"),
					payload("u1", "b", "2024-01-01T10:01:00Z"),
				],
				ClientInfo::default(),
			)
			.await
			.unwrap();

		assert_eq!(report.processed, 2);
		assert_eq!(report.duplicates, 0);
		assert!(report.skipped.is_empty());
		assert_eq!(ctx.buffered(&t).await, 2);
	}

	#[tokio::test]
	async fn duplicates_within_the_batch_are_discarded() {
		let ctx = context(100).await;
		let t = tenant();

		let report = ctx
			.ingest(
				&t,
				vec![
					payload("u1", "a", "2024-01-01T10:00:00Z"),
					payload("u1", "a", "2024-01-01T10:00:00Z"),
				],
				ClientInfo::default(),
			)
			.await
			.unwrap();

		assert_eq!(report.processed, 1);
		assert_eq!(report.duplicates, 1);
	}

	#[tokio::test]
	async fn duplicates_across_requests_are_discarded() {
		let ctx = context(100).await;
		let t = tenant();

		let first = vec![payload("u1", "a", "2024-01-01T10:00:00Z")];
		ctx.ingest(&t, first.clone(), ClientInfo::default())
			.await
			.unwrap();
		let report = ctx.ingest(&t, first, ClientInfo::default()).await.unwrap();

		assert_eq!(report.processed, 0);
		assert_eq!(report.duplicates, 1);
	}

	#[tokio::test]
	async fn invalid_events_are_skipped_not_fatal() {
		let ctx = context(100).await;
		let t = tenant();

		let report = ctx
			.ingest(
				&t,
				vec![
					payload("", "a", "2024-01-01T10:00:00Z"),
					payload("u1", "b", "2024-01-01T10:00:00Z"),
				],
				ClientInfo::default(),
			)
			.await
			.unwrap();

		assert_eq!(report.processed, 1);
		assert_eq!(report.skipped.len(), 1);
		assert_eq!(report.skipped[0].index, 0);
		assert!(report.skipped[0].reasons[0].contains("userId"));
	}

	#[tokio::test]
	async fn empty_and_oversized_batches_are_rejected() {
		let ctx = context(100).await;
		let t = tenant();

		assert!(matches!(
			ctx.ingest(&t, vec![], ClientInfo::default()).await,
			Err(PulseError::InvalidInput { .. })
		));

		let oversized: Vec<EventPayload> = (0..MAX_BATCH_SIZE + 1)
			.map(|i| payload("u1", "e", &format!("2024-01-01T10:00:{:02}Z", i % 60)))
			.collect();
		assert!(matches!(
			ctx.ingest(&t, oversized, ClientInfo::default()).await,
			Err(PulseError::InvalidInput { .. })
		));
	}

	#[tokio::test]
	async fn size_trigger_flushes_to_queue() {
		let ctx = context(2).await;
		let t = tenant();

		ctx.ingest(
			&t,
			vec![
				payload("u1", "a", "2024-01-01T10:00:00Z"),
				payload("u1", "b", "2024-01-01T10:01:00Z"),
				payload("u1", "c", "2024-01-01T10:02:00Z"),
			],
			ClientInfo::default(),
		)
		.await
		.unwrap();

		// First two flushed as a full batch; the third remains buffered.
		assert_eq!(ctx.buffered(&t).await, 1);
		assert_eq!(ctx.queue.counts().await.unwrap().queued, 1);
	}

	#[tokio::test]
	async fn flush_all_empties_buffers() {
		let ctx = context(100).await;
		let t = tenant();

		ctx.ingest(
			&t,
			vec![payload("u1", "a", "2024-01-01T10:00:00Z")],
			ClientInfo::default(),
		)
		.await
		.unwrap();

		let flushed = ctx.flush_all().await.unwrap();
		assert_eq!(flushed, 1);
		assert_eq!(ctx.buffered(&t).await, 0);
		assert_eq!(ctx.queue.counts().await.unwrap().queued, 1);
	}
}
