// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Periodic flush of aged tenant buffers.
//!
//! The size trigger handles busy tenants; this task guarantees quiet
//! tenants still see their events persisted within the configured
//! buffer timeout. Cooperative start/stop, tied to the server lifecycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::IngestionContext;

pub struct BufferSweeper {
	shutdown_tx: broadcast::Sender<()>,
	handle: JoinHandle<()>,
}

impl BufferSweeper {
	/// Spawn the sweeper. It ticks at half the buffer timeout so that no
	/// buffer waits much past its deadline.
	pub fn start(context: Arc<IngestionContext>) -> Self {
		let timeout_ms = context.config().buffer_timeout_ms;
		let interval = Duration::from_millis((timeout_ms / 2).max(50));
		let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

		let handle = tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = tokio::time::sleep(interval) => {
						match context.flush_aged().await {
							Ok(flushed) if flushed > 0 => {
								debug!(flushed, "sweeper flushed aged buffers");
							}
							Ok(_) => {}
							Err(e) => {
								warn!(error = %e, "sweeper failed to flush aged buffers");
							}
						}
					}
					_ = shutdown_rx.recv() => {
						info!("buffer sweeper shutting down");
						break;
					}
				}
			}
		});

		Self {
			shutdown_tx,
			handle,
		}
	}

	/// Stop the sweeper and wait for it to exit. Buffers still holding
	/// events are the caller's responsibility (`flush_all`).
	pub async fn shutdown(self) {
		let _ = self.shutdown_tx.send(());
		let _ = self.handle.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::ClientInfo;
	use pulse_core::{EventPayload, OrgId, ProjectId, Tenant};
	use pulse_server_cache::MemoryCache;
	use pulse_server_config::IngestConfig;
	use pulse_server_db::{testing::test_pool, QueueRepository};
	use pulse_server_queue::JobQueue;
	use pulse_server_realtime::RealtimeBus;

	#[tokio::test]
	async fn aged_buffers_are_flushed_within_the_timeout() {
		let queue = Arc::new(JobQueue::new(Arc::new(QueueRepository::new(
			test_pool().await,
		))));
		let context = Arc::new(IngestionContext::new(
			Arc::clone(&queue),
			Arc::new(MemoryCache::new()),
			Arc::new(RealtimeBus::new()),
			IngestConfig {
				batch_size: 1_000,
				buffer_timeout_ms: 100,
				worker_concurrency: 1,
			},
		));

		let tenant = Tenant::new(OrgId::new("org1").unwrap(), ProjectId::new("p1").unwrap());
		context
			.ingest(
				&tenant,
				vec![EventPayload {
					user_id: "u1".to_string(),
					event_name: "a".to_string(),
					..Default::default()
				}],
				ClientInfo::default(),
			)
			.await
			.unwrap();
		assert_eq!(context.buffered(&tenant).await, 1);

		let sweeper = BufferSweeper::start(Arc::clone(&context));

		// Within timeout + epsilon the buffer must be empty.
		for _ in 0..40 {
			if context.buffered(&tenant).await == 0 {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert_eq!(context.buffered(&tenant).await, 0);
		assert_eq!(queue.counts().await.unwrap().queued, 1);

		sweeper.shutdown().await;
	}
}
