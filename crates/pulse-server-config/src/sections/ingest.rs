// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Ingestion pipeline tunables.

use serde::Deserialize;

/// Ingestion configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct IngestConfig {
	/// Buffer size threshold triggering a synchronous flush.
	pub batch_size: usize,
	/// Buffer age threshold in milliseconds, enforced by the sweeper.
	pub buffer_timeout_ms: u64,
	/// Number of queue workers persisting event batches.
	pub worker_concurrency: usize,
}

impl Default for IngestConfig {
	fn default() -> Self {
		Self {
			batch_size: 1_000,
			buffer_timeout_ms: 5_000,
			worker_concurrency: 2,
		}
	}
}

/// Ingestion configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfigLayer {
	#[serde(default)]
	pub batch_size: Option<usize>,
	#[serde(default)]
	pub buffer_timeout_ms: Option<u64>,
	#[serde(default)]
	pub worker_concurrency: Option<usize>,
}

impl IngestConfigLayer {
	pub fn merge(&mut self, other: IngestConfigLayer) {
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.buffer_timeout_ms.is_some() {
			self.buffer_timeout_ms = other.buffer_timeout_ms;
		}
		if other.worker_concurrency.is_some() {
			self.worker_concurrency = other.worker_concurrency;
		}
	}

	pub fn finalize(self) -> IngestConfig {
		let defaults = IngestConfig::default();
		IngestConfig {
			batch_size: self.batch_size.unwrap_or(defaults.batch_size).max(1),
			buffer_timeout_ms: self
				.buffer_timeout_ms
				.unwrap_or(defaults.buffer_timeout_ms)
				.max(100),
			worker_concurrency: self
				.worker_concurrency
				.unwrap_or(defaults.worker_concurrency)
				.max(1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = IngestConfigLayer::default().finalize();
		assert_eq!(config.batch_size, 1_000);
		assert_eq!(config.buffer_timeout_ms, 5_000);
		assert_eq!(config.worker_concurrency, 2);
	}

	#[test]
	fn zero_values_are_clamped() {
		let layer = IngestConfigLayer {
			batch_size: Some(0),
			buffer_timeout_ms: Some(0),
			worker_concurrency: Some(0),
		};
		let config = layer.finalize();
		assert_eq!(config.batch_size, 1);
		assert_eq!(config.buffer_timeout_ms, 100);
		assert_eq!(config.worker_concurrency, 1);
	}
}
