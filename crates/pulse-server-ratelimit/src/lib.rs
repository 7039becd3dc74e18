// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Per-principal rate limiting over the KV cache.
//!
//! Fixed windows keyed `rate_limit:{class}:{principal}:{window_start}`.
//! The principal is the API key id, or the client IP for anonymous
//! routes. A cache outage degrades to "allow" with a warning: quota
//! enforcement is never worth failing a healthy request.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use pulse_core::PulseError;
use pulse_server_cache::Cache;
use pulse_server_config::RateLimitConfig;

/// Route classes with distinct quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
	/// Everything without a more specific class.
	General,
	/// Event ingestion; a burst ceiling on batches.
	Ingest,
	/// Analytics queries.
	Analytics,
	/// Key administration.
	Admin,
}

impl RouteClass {
	pub fn as_str(&self) -> &'static str {
		match self {
			RouteClass::General => "general",
			RouteClass::Ingest => "ingest",
			RouteClass::Analytics => "analytics",
			RouteClass::Admin => "admin",
		}
	}
}

/// Windowed counter rate limiter.
pub struct RateLimiter<C: Cache> {
	cache: Arc<C>,
	general: RateLimitConfig,
}

impl<C: Cache> RateLimiter<C> {
	pub fn new(cache: Arc<C>, general: RateLimitConfig) -> Self {
		Self { cache, general }
	}

	/// `(window, max)` for a route class. Only the general tier is
	/// configurable; the rest are fixed policy.
	fn tier(&self, class: RouteClass) -> (Duration, u64) {
		match class {
			RouteClass::General => (
				Duration::from_millis(self.general.window_ms),
				self.general.max_requests,
			),
			RouteClass::Ingest => (Duration::from_secs(60), 10),
			RouteClass::Analytics => (Duration::from_secs(5 * 60), 2_000),
			RouteClass::Admin => (Duration::from_secs(10 * 60), 200),
		}
	}

	/// Count one request for `principal` under `class`. Returns
	/// `RateLimited` with the seconds until the window resets when the
	/// quota is exhausted.
	#[tracing::instrument(skip(self), fields(class = class.as_str(), principal))]
	pub async fn check(&self, class: RouteClass, principal: &str) -> Result<(), PulseError> {
		let (window, max) = self.tier(class);
		let window_ms = window.as_millis() as i64;
		let now_ms = Utc::now().timestamp_millis();
		let window_start = now_ms - now_ms.rem_euclid(window_ms);

		let key = format!(
			"rate_limit:{}:{}:{}",
			class.as_str(),
			principal,
			window_start
		);

		// TTL slightly past the window end so the counter outlives it.
		let ttl = window + Duration::from_secs(1);

		let count = match self.cache.incr_by(&key, 1, ttl).await {
			Ok(count) => count,
			Err(e) => {
				warn!(error = %e, "rate limit cache unavailable, allowing request");
				return Ok(());
			}
		};

		if count as u64 > max {
			let window_end_ms = window_start + window_ms;
			let retry_after_secs = ((window_end_ms - now_ms).max(0) as u64).div_ceil(1_000).max(1);
			return Err(PulseError::RateLimited { retry_after_secs });
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use pulse_server_cache::{CacheError, MemoryCache};

	fn limiter() -> RateLimiter<MemoryCache> {
		RateLimiter::new(Arc::new(MemoryCache::new()), RateLimitConfig::default())
	}

	#[tokio::test]
	async fn ingest_allows_ten_then_limits() {
		let limiter = limiter();

		for _ in 0..10 {
			limiter.check(RouteClass::Ingest, "key1").await.unwrap();
		}

		let err = limiter.check(RouteClass::Ingest, "key1").await.unwrap_err();
		match err {
			PulseError::RateLimited { retry_after_secs } => {
				assert!(retry_after_secs >= 1);
				assert!(retry_after_secs <= 60);
			}
			other => panic!("expected RateLimited, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn principals_are_isolated() {
		let limiter = limiter();

		for _ in 0..10 {
			limiter.check(RouteClass::Ingest, "key1").await.unwrap();
		}
		assert!(limiter.check(RouteClass::Ingest, "key1").await.is_err());
		assert!(limiter.check(RouteClass::Ingest, "key2").await.is_ok());
	}

	#[tokio::test]
	async fn classes_have_independent_counters() {
		let limiter = limiter();

		for _ in 0..10 {
			limiter.check(RouteClass::Ingest, "key1").await.unwrap();
		}
		assert!(limiter.check(RouteClass::Ingest, "key1").await.is_err());
		assert!(limiter.check(RouteClass::Analytics, "key1").await.is_ok());
		assert!(limiter.check(RouteClass::General, "key1").await.is_ok());
	}

	struct BrokenCache;

	#[async_trait]
	impl Cache for BrokenCache {
		async fn get(&self, _key: &str) -> pulse_server_cache::Result<Option<String>> {
			Err(CacheError::Unavailable("down".to_string()))
		}

		async fn set(
			&self,
			_key: &str,
			_value: &str,
			_ttl: Duration,
		) -> pulse_server_cache::Result<()> {
			Err(CacheError::Unavailable("down".to_string()))
		}

		async fn set_nx(
			&self,
			_key: &str,
			_value: &str,
			_ttl: Duration,
		) -> pulse_server_cache::Result<bool> {
			Err(CacheError::Unavailable("down".to_string()))
		}

		async fn incr_by(
			&self,
			_key: &str,
			_delta: i64,
			_ttl: Duration,
		) -> pulse_server_cache::Result<i64> {
			Err(CacheError::Unavailable("down".to_string()))
		}

		async fn delete(&self, _key: &str) -> pulse_server_cache::Result<()> {
			Err(CacheError::Unavailable("down".to_string()))
		}
	}

	#[tokio::test]
	async fn cache_outage_fails_open() {
		let limiter = RateLimiter::new(Arc::new(BrokenCache), RateLimitConfig::default());
		for _ in 0..100 {
			limiter.check(RouteClass::Ingest, "key1").await.unwrap();
		}
	}
}
