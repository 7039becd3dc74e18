// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! General rate limiter tunables. The per-class ingest/analytics/admin
//! windows are fixed policy and live with the limiter itself.

use serde::Deserialize;

/// Rate limit configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
	/// General window length in milliseconds.
	pub window_ms: u64,
	/// Maximum requests per general window.
	pub max_requests: u64,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			window_ms: 15 * 60 * 1_000,
			max_requests: 100,
		}
	}
}

/// Rate limit configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfigLayer {
	#[serde(default)]
	pub window_ms: Option<u64>,
	#[serde(default)]
	pub max_requests: Option<u64>,
}

impl RateLimitConfigLayer {
	pub fn merge(&mut self, other: RateLimitConfigLayer) {
		if other.window_ms.is_some() {
			self.window_ms = other.window_ms;
		}
		if other.max_requests.is_some() {
			self.max_requests = other.max_requests;
		}
	}

	pub fn finalize(self) -> RateLimitConfig {
		let defaults = RateLimitConfig::default();
		RateLimitConfig {
			window_ms: self.window_ms.unwrap_or(defaults.window_ms).max(1_000),
			max_requests: self.max_requests.unwrap_or(defaults.max_requests).max(1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = RateLimitConfigLayer::default().finalize();
		assert_eq!(config.window_ms, 900_000);
		assert_eq!(config.max_requests, 100);
	}
}
