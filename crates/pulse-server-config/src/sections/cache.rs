// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Cache TTL tunables.

use serde::Deserialize;

/// Cache configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct CacheConfig {
	/// Default TTL in seconds for cache entries without an explicit TTL.
	pub default_ttl_secs: u64,
	/// TTL in seconds for cached analytics query results.
	pub query_ttl_secs: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			default_ttl_secs: 3_600,
			query_ttl_secs: 1_800,
		}
	}
}

/// Cache configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub default_ttl_secs: Option<u64>,
	#[serde(default)]
	pub query_ttl_secs: Option<u64>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.default_ttl_secs.is_some() {
			self.default_ttl_secs = other.default_ttl_secs;
		}
		if other.query_ttl_secs.is_some() {
			self.query_ttl_secs = other.query_ttl_secs;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		let defaults = CacheConfig::default();
		CacheConfig {
			default_ttl_secs: self
				.default_ttl_secs
				.unwrap_or(defaults.default_ttl_secs)
				.max(1),
			query_ttl_secs: self.query_ttl_secs.unwrap_or(defaults.query_ttl_secs).max(1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = CacheConfigLayer::default().finalize();
		assert_eq!(config.default_ttl_secs, 3_600);
		assert_eq!(config.query_ttl_secs, 1_800);
	}
}
