// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Periodic reclamation of expired cache entries.
//!
//! Reads already treat expired entries as absent; the sweeper only frees
//! their memory. It runs as a cooperative task with explicit start/stop
//! tied to the server lifecycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::memory::MemoryCache;

pub struct CacheSweeper {
	shutdown_tx: broadcast::Sender<()>,
	handle: JoinHandle<()>,
}

impl CacheSweeper {
	/// Spawn a sweeper over `cache` firing every `interval`.
	pub fn start(cache: Arc<MemoryCache>, interval: Duration) -> Self {
		let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

		let handle = tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = tokio::time::sleep(interval) => {
						let swept = cache.sweep_expired().await;
						if swept > 0 {
							debug!(swept, "cache sweep reclaimed expired entries");
						}
					}
					_ = shutdown_rx.recv() => {
						info!("cache sweeper shutting down");
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

	/// Stop the sweeper and wait for it to exit.
	pub async fn shutdown(self) {
		let _ = self.shutdown_tx.send(());
		let _ = self.handle.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Cache;

	#[tokio::test]
	async fn sweeper_reclaims_and_shuts_down() {
		let cache = Arc::new(MemoryCache::new());
		cache
			.set("dead", "v", Duration::from_millis(0))
			.await
			.unwrap();

		let sweeper = CacheSweeper::start(Arc::clone(&cache), Duration::from_millis(10));
		tokio::time::sleep(Duration::from_millis(50)).await;
		sweeper.shutdown().await;

		assert!(cache.is_empty().await);
	}
}
