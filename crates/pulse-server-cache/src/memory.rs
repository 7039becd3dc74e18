// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! In-process cache backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{CacheError, Result};
use crate::Cache;

#[derive(Debug, Clone)]
struct Entry {
	value: String,
	expires_at: DateTime<Utc>,
}

impl Entry {
	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}
}

/// In-memory [`Cache`] implementation.
///
/// Reads treat expired entries as absent; the sweeper
/// ([`crate::sweeper::CacheSweeper`]) reclaims their memory in the
/// background.
#[derive(Default)]
pub struct MemoryCache {
	entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn expiry(ttl: Duration) -> DateTime<Utc> {
		// A TTL beyond chrono's range is clamped to roughly a millennium.
		let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(365_000));
		Utc::now() + ttl
	}

	/// Drop every expired entry, returning how many were removed.
	pub async fn sweep_expired(&self) -> usize {
		let now = Utc::now();
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(now));
		before - entries.len()
	}

	/// Number of live (unexpired) entries.
	pub async fn len(&self) -> usize {
		let now = Utc::now();
		let entries = self.entries.read().await;
		entries.values().filter(|e| !e.is_expired(now)).count()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[async_trait]
impl Cache for MemoryCache {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		let now = Utc::now();
		let entries = self.entries.read().await;
		Ok(entries
			.get(key)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| entry.value.clone()))
	}

	async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
		let mut entries = self.entries.write().await;
		entries.insert(
			key.to_string(),
			Entry {
				value: value.to_string(),
				expires_at: Self::expiry(ttl),
			},
		);
		Ok(())
	}

	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
		let now = Utc::now();
		let mut entries = self.entries.write().await;
		match entries.get(key) {
			Some(entry) if !entry.is_expired(now) => Ok(false),
			_ => {
				entries.insert(
					key.to_string(),
					Entry {
						value: value.to_string(),
						expires_at: Self::expiry(ttl),
					},
				);
				Ok(true)
			}
		}
	}

	async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64> {
		let now = Utc::now();
		let mut entries = self.entries.write().await;
		match entries.get_mut(key) {
			Some(entry) if !entry.is_expired(now) => {
				let current: i64 =
					entry
						.value
						.parse()
						.map_err(|_| CacheError::InvalidValue {
							key: key.to_string(),
							message: "not an integer".to_string(),
						})?;
				let next = current + delta;
				entry.value = next.to_string();
				Ok(next)
			}
			_ => {
				entries.insert(
					key.to_string(),
					Entry {
						value: delta.to_string(),
						expires_at: Self::expiry(ttl),
					},
				);
				Ok(delta)
			}
		}
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let mut entries = self.entries.write().await;
		entries.remove(key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINUTE: Duration = Duration::from_secs(60);

	#[tokio::test]
	async fn set_get_delete() {
		let cache = MemoryCache::new();
		cache.set("k", "v", MINUTE).await.unwrap();
		assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

		cache.delete("k").await.unwrap();
		assert_eq!(cache.get("k").await.unwrap(), None);
	}

	#[tokio::test]
	async fn expired_entries_read_as_absent() {
		let cache = MemoryCache::new();
		cache.set("k", "v", Duration::from_millis(0)).await.unwrap();
		assert_eq!(cache.get("k").await.unwrap(), None);
	}

	#[tokio::test]
	async fn set_nx_only_first_writer_wins() {
		let cache = MemoryCache::new();
		assert!(cache.set_nx("k", "first", MINUTE).await.unwrap());
		assert!(!cache.set_nx("k", "second", MINUTE).await.unwrap());
		assert_eq!(cache.get("k").await.unwrap(), Some("first".to_string()));
	}

	#[tokio::test]
	async fn set_nx_succeeds_over_expired_entry() {
		let cache = MemoryCache::new();
		cache.set("k", "old", Duration::from_millis(0)).await.unwrap();
		assert!(cache.set_nx("k", "new", MINUTE).await.unwrap());
	}

	#[tokio::test]
	async fn incr_creates_and_accumulates() {
		let cache = MemoryCache::new();
		assert_eq!(cache.incr_by("n", 5, MINUTE).await.unwrap(), 5);
		assert_eq!(cache.incr_by("n", 2, MINUTE).await.unwrap(), 7);
		assert_eq!(cache.get("n").await.unwrap(), Some("7".to_string()));
	}

	#[tokio::test]
	async fn incr_on_text_value_is_invalid() {
		let cache = MemoryCache::new();
		cache.set("k", "not-a-number", MINUTE).await.unwrap();
		let err = cache.incr_by("k", 1, MINUTE).await.unwrap_err();
		assert!(matches!(err, CacheError::InvalidValue { .. }));
	}

	#[tokio::test]
	async fn sweep_reclaims_expired_entries() {
		let cache = MemoryCache::new();
		cache.set("live", "v", MINUTE).await.unwrap();
		cache
			.set("dead", "v", Duration::from_millis(0))
			.await
			.unwrap();

		let swept = cache.sweep_expired().await;
		assert_eq!(swept, 1);
		assert_eq!(cache.len().await, 1);
	}
}
