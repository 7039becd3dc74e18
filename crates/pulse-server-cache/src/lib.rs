// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Short-TTL key/value cache.
//!
//! The cache owns deduplication markers, rate-limit counters, realtime
//! event counters, and precomputed analytics results. Consumers treat it
//! as fallible and degrade gracefully: a cache outage must never fail a
//! request, so every call site pairs a `Result` with a warn-and-continue
//! path.
//!
//! Key namespaces: `dedup:`, `events:`, `rate_limit:`, `funnel:`,
//! `retention:`, `metrics:`, `user_journey:`, `event_summary:`.

pub mod error;
pub mod memory;
pub mod sweeper;

pub use error::{CacheError, Result};
pub use memory::MemoryCache;
pub use sweeper::CacheSweeper;

use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait Cache: Send + Sync {
	/// Fetch a live value. Expired entries read as absent.
	async fn get(&self, key: &str) -> Result<Option<String>>;

	/// Store a value with a TTL, replacing any existing entry.
	async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

	/// Store a value only if the key is absent (or expired). Returns
	/// `true` when the write happened. This is the atomic
	/// check-then-mark used by deduplication.
	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

	/// Increment an integer value by `delta`, creating it (with `ttl`)
	/// if absent. Returns the new value. The TTL of an existing entry is
	/// not refreshed.
	async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64>;

	/// Remove an entry.
	async fn delete(&self, key: &str) -> Result<()>;
}
